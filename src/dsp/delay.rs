//! Delay line with a feedback loop.
//!
//! The output is the delayed signal only; the loop feeds `output * feedback`
//! back into the line. A delay that sits inside a feedback cycle can never be
//! shorter than one render quantum, so a zero delay time still delays by
//! `min_delay` frames.

/// A single-channel delay line with fixed feedback gain.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    delay_samples: usize,
    min_delay: usize,

    /// Delay time in seconds, as requested.
    delay_time: f64,
    /// Feedback gain applied to the delayed signal before re-entering the line.
    pub feedback: f32,
}

impl FeedbackDelay {
    /// Create a new delay line.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz.
    /// - `max_delay_seconds`: Maximum supported delay time.
    /// - `min_delay`: Shortest delay in frames (the render quantum when feedback is on).
    pub fn new(sample_rate: f64, max_delay_seconds: f64, min_delay: usize) -> Self {
        let buffer_size = (sample_rate * max_delay_seconds) as usize + min_delay + 1;
        let mut d = Self {
            buffer: vec![0.0; buffer_size],
            write_pos: 0,
            sample_rate,
            delay_samples: 0,
            min_delay,
            delay_time: 0.0,
            feedback: 0.0,
        };
        d.set_delay_time(0.0);
        d
    }

    /// Create a delay with specific parameters.
    pub fn with_params(
        sample_rate: f64,
        max_delay_seconds: f64,
        min_delay: usize,
        delay_time: f64,
        feedback: f64,
    ) -> Self {
        let mut d = Self::new(sample_rate, max_delay_seconds, min_delay);
        d.feedback = feedback.clamp(-0.99, 0.99) as f32;
        d.set_delay_time(delay_time);
        d
    }

    /// Set the delay time in seconds, clamped to the line's capacity.
    pub fn set_delay_time(&mut self, seconds: f64) {
        let max_samples = self.buffer.len() - 1;
        self.delay_time = seconds.max(0.0);
        let requested = (self.delay_time * self.sample_rate).round() as usize;
        self.delay_samples = requested.max(self.min_delay).min(max_samples);
    }

    pub fn delay_time(&self) -> f64 {
        self.delay_time
    }

    /// Effective delay in frames.
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let buffer_len = self.buffer.len();
        if self.delay_samples == 0 {
            // No feedback cycle and no delay: straight through.
            self.buffer[self.write_pos] = input;
            self.write_pos = (self.write_pos + 1) % buffer_len;
            return input;
        }
        let read_pos = (self.write_pos + buffer_len - self.delay_samples) % buffer_len;
        let delayed = self.buffer[read_pos];

        // Write input + feedback to buffer
        self.buffer[self.write_pos] = input + delayed * self.feedback;
        self.write_pos = (self.write_pos + 1) % buffer_len;

        delayed
    }

    /// Process a block of audio in-place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    /// Clear the delay buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(delay: &mut FeedbackDelay, n: usize) -> Vec<f32> {
        (0..n).map(|i| delay.process(if i == 0 { 1.0 } else { 0.0 })).collect()
    }

    #[test]
    fn outputs_delayed_signal() {
        let mut delay = FeedbackDelay::with_params(1000.0, 1.0, 1, 0.01, 0.0);
        let out = impulse_response(&mut delay, 30);
        assert_eq!(delay.delay_samples(), 10);
        for (i, &s) in out.iter().enumerate() {
            let expected = if i == 10 { 1.0 } else { 0.0 };
            assert!((s - expected).abs() < 1e-6, "sample {i}: {s}");
        }
    }

    #[test]
    fn feedback_repeats_decay_by_gain() {
        let mut delay = FeedbackDelay::with_params(1000.0, 1.0, 1, 0.01, 0.3);
        let out = impulse_response(&mut delay, 40);
        assert!((out[10] - 1.0).abs() < 1e-6);
        assert!((out[20] - 0.3).abs() < 1e-6);
        assert!((out[30] - 0.09).abs() < 1e-6);
        assert!(out[15].abs() < 1e-6);
    }

    #[test]
    fn zero_delay_clamps_to_quantum() {
        let mut delay = FeedbackDelay::with_params(44100.0, 5.0, 128, 0.0, 0.3);
        assert_eq!(delay.delay_samples(), 128);
        let out = impulse_response(&mut delay, 300);
        assert!((out[128] - 1.0).abs() < 1e-6);
        assert!((out[256] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn delay_time_clamped_to_capacity() {
        let mut delay = FeedbackDelay::new(1000.0, 1.0, 1);
        delay.set_delay_time(10.0);
        assert!(delay.delay_samples() < 1002);
        assert_eq!(delay.delay_time(), 10.0);
    }

    #[test]
    fn zero_delay_without_loop_passes_through() {
        let mut delay = FeedbackDelay::with_params(1000.0, 1.0, 0, 0.0, 0.0);
        assert_eq!(delay.delay_samples(), 0);
        assert_eq!(delay.process(0.75), 0.75);
        assert_eq!(delay.process(-0.25), -0.25);
    }

    #[test]
    fn clear_silences_line() {
        let mut delay = FeedbackDelay::with_params(1000.0, 1.0, 1, 0.005, 0.3);
        delay.process(1.0);
        delay.clear();
        let out: Vec<f32> = (0..20).map(|_| delay.process(0.0)).collect();
        assert!(out.iter().all(|s| *s == 0.0));
    }
}
