//! Synthetic reverb impulse responses.
//!
//! White noise shaped by a `n^decay` envelope, where `n` falls linearly from
//! 1 to 0 across the buffer. Every call draws fresh noise.

use rand::Rng;

use super::buffer::SampleBuffer;

/// A stereo (or n-channel) impulse response for the convolver.
pub type ImpulseResponse = SampleBuffer;

/// Generate an impulse response using the thread-local RNG.
pub fn generate(duration_sec: f64, decay: f64, sample_rate: u32, channels: usize) -> ImpulseResponse {
    generate_with_rng(&mut rand::thread_rng(), duration_sec, decay, sample_rate, channels)
}

/// Generate an impulse response from the given RNG.
pub fn generate_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    duration_sec: f64,
    decay: f64,
    sample_rate: u32,
    channels: usize,
) -> ImpulseResponse {
    let length = (sample_rate as f64 * duration_sec.max(0.0)).round() as usize;
    let data = (0..channels)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let n = (length - i) as f64 / length as f64;
                    let noise: f64 = rng.gen_range(-1.0..=1.0);
                    (noise * n.powf(decay)) as f32
                })
                .collect()
        })
        .collect();
    log::trace!("generated {channels}ch impulse, {length} frames, decay {decay}");
    SampleBuffer::new(data, sample_rate)
}
