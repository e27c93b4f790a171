//! Biquad filter: matches WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// Default Q of a browser biquad, in dB for lowpass/highpass.
pub const DEFAULT_Q_DB: f64 = 1.0;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
}

/// A biquad IIR filter (2nd order), one channel.
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson),
/// with the resonance given in dB as WebAudio does for lowpass/highpass.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    frequency: f64,
    q_db: f64,

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, frequency: f64, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency,
            q_db: DEFAULT_Q_DB,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    ///
    /// The cutoff is normalized to Nyquist and clamped to [0, 1]. At the
    /// ends of that range the filter degenerates to pass-through or silence.
    pub fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let cutoff = (self.frequency / nyquist).clamp(0.0, 1.0);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass if cutoff >= 1.0 => (1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            FilterType::Lowpass if cutoff <= 0.0 => (0.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            FilterType::Highpass if cutoff >= 1.0 => (0.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            FilterType::Highpass if cutoff <= 0.0 => (1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            _ => {
                let w0 = PI * cutoff;
                let cos_w0 = w0.cos();
                let resonance = 10f64.powf(self.q_db / 20.0);
                let alpha = w0.sin() / (2.0 * resonance);
                let a0 = 1.0 + alpha;
                let a1 = -2.0 * cos_w0;
                let a2 = 1.0 - alpha;
                match self.filter_type {
                    FilterType::Lowpass => {
                        let beta = (1.0 - cos_w0) / 2.0;
                        (beta, 2.0 * beta, beta, a0, a1, a2)
                    }
                    FilterType::Highpass => {
                        let beta = (1.0 + cos_w0) / 2.0;
                        (beta, -2.0 * beta, beta, a0, a1, a2)
                    }
                }
            }
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
        self.dirty = false;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Process a block of samples in-place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s as f64) as f32;
        }
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Set frequency and mark coefficients dirty.
    pub fn set_frequency(&mut self, freq: f64) {
        self.frequency = freq;
        self.dirty = true;
    }

    /// Set Q (dB) and mark coefficients dirty.
    pub fn set_q_db(&mut self, q_db: f64) {
        self.q_db = q_db;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(f: &mut BiquadFilter, input: f64, n: usize) -> f64 {
        let mut output = 0.0;
        for _ in 0..n {
            output = f.process(input);
        }
        output
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 5000.0, 44100.0);
        let output = settle(&mut f, 1.0, 1000);
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 1000.0, 44100.0);
        let output = settle(&mut f, 1.0, 1000);
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 200.0, 44100.0);

        // Generate a 10kHz sine and measure output amplitude
        let freq = 10000.0;
        let mut max_out = 0.0_f64;
        for i in 0..4410 {
            let t = i as f64 / 44100.0;
            let input = (2.0 * PI * freq * t).sin();
            let out = f.process(input);
            if i > 1000 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        assert!(
            max_out < 0.01,
            "Lowpass@200Hz should strongly attenuate 10kHz, got amplitude {max_out}"
        );
    }

    #[test]
    fn lowpass_above_nyquist_is_passthrough() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 20000.0, 16000.0);
        for &x in &[0.3, -0.7, 1.0, 0.0] {
            assert_eq!(f.process(x), x);
        }
    }

    #[test]
    fn highpass_above_nyquist_is_silent() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 9000.0, 16000.0);
        for &x in &[0.3, -0.7, 1.0] {
            assert_eq!(f.process(x), 0.0);
        }
    }

    #[test]
    fn frequency_change_takes_effect() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 10.0, 44100.0);
        // 10 Hz highpass lets a fast square through almost untouched
        let mut passed = 0.0_f64;
        for i in 0..2000 {
            let x = if (i / 10) % 2 == 0 { 1.0 } else { -1.0 };
            passed = passed.max(f.process(x).abs());
        }
        assert!(passed > 0.9);

        f.set_frequency(8000.0);
        f.reset();
        let out = settle(&mut f, 1.0, 2000);
        assert!(out.abs() < 0.001);
    }

    #[test]
    fn resonance_peaks_near_cutoff() {
        // Q = 1 dB gives a small bump (~+1 dB) at the cutoff frequency
        let sr = 44100.0;
        let fc = 1000.0;
        let mut f = BiquadFilter::new(FilterType::Lowpass, fc, sr);
        let mut max_out = 0.0_f64;
        for i in 0..44100 {
            let t = i as f64 / sr;
            let out = f.process((2.0 * PI * fc * t).sin());
            if i > 4410 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(max_out > 1.05 && max_out < 1.2, "got {max_out}");
    }

    #[test]
    fn filter_output_finite() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 18000.0, 44100.0);
        let mut block: Vec<f32> = (0..10000).map(|i| if i % 100 == 0 { 1.0 } else { 0.0 }).collect();
        f.process_block(&mut block);
        assert!(block.iter().all(|s| s.is_finite()));
    }
}
