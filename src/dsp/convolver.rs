//! Convolution reverb: uniformly partitioned FFT convolution.
//!
//! The impulse response is cut into partitions of one block each and kept in
//! the frequency domain. Every input block is transformed once, pushed onto a
//! frequency-domain delay line, multiplied against all partitions and
//! transformed back (overlap-save). Latency is zero; the cost per block grows
//! with the impulse length.
//!
//! Like the browser's ConvolverNode, the response is normalized by default so
//! that impulses of different loudness produce a similar wet level.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::buffer::{AudioBlock, SampleBuffer};

const GAIN_CALIBRATION_DB: f32 = -58.0;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Scale applied to a response so its RMS power lands at the calibration level.
pub fn normalization_scale(response: &SampleBuffer) -> f32 {
    let channels = response.channel_count();
    let frames = response.frames();
    let mut power: f32 = response
        .channels()
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|s| s * s)
        .sum();
    if channels > 0 && frames > 0 {
        power = (power / (channels * frames) as f32).sqrt();
    }
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = 1.0 / power;
    scale *= 10f32.powf(GAIN_CALIBRATION_DB * 0.05);
    if response.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / response.sample_rate() as f32;
    }
    if channels == 4 {
        scale *= 0.5;
    }
    scale
}

/// Per-input-channel state: the last two blocks of input and the spectra of
/// recent blocks, newest first.
struct InputLane {
    history: Vec<f32>,
    spectra: VecDeque<Vec<Complex<f32>>>,
}

pub struct Convolver {
    block: usize,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// `[ir_channel][partition][bin]`
    partitions: Vec<Vec<Vec<Complex<f32>>>>,
    lanes: Vec<InputLane>,
    scratch: Vec<Complex<f32>>,
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("block", &self.block)
            .field("channels", &self.partitions.len())
            .field("partitions", &self.partition_count())
            .finish()
    }
}

impl Convolver {
    /// Prepare a convolver for `response`, processing `block` frames per call.
    pub fn new(response: &SampleBuffer, block: usize, normalize: bool) -> Self {
        let block = block.max(1);
        let fft_size = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let scale = if normalize { normalization_scale(response) } else { 1.0 };
        let partitions: Vec<Vec<Vec<Complex<f32>>>> = response
            .channels()
            .iter()
            .map(|ch| {
                ch.chunks(block)
                    .map(|chunk| {
                        let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size];
                        for (bin, &s) in spectrum.iter_mut().zip(chunk) {
                            bin.re = s * scale;
                        }
                        forward.process(&mut spectrum);
                        spectrum
                    })
                    .collect()
            })
            .collect();

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        log::debug!(
            "convolver ready: {} channels, {} partitions of {block}, scale {scale}",
            partitions.len(),
            partitions.first().map_or(0, Vec::len)
        );

        Convolver {
            block,
            fft_size,
            forward,
            inverse,
            partitions,
            lanes: Vec::new(),
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            work: vec![Complex::new(0.0, 0.0); fft_size],
            accum: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.first().map_or(0, Vec::len)
    }

    /// Output channel count: one per response channel.
    pub fn output_channels(&self) -> usize {
        self.partitions.len().max(1)
    }

    /// Convolve one block. `input` must hold exactly `block_size()` frames.
    /// Mono input feeds every response channel; stereo input channel `c`
    /// feeds response channel `c`.
    pub fn process(&mut self, input: &AudioBlock) -> AudioBlock {
        let out_channels = self.output_channels();
        let mut out = AudioBlock::silent(out_channels, self.block);
        if self.partitions.is_empty() || self.partition_count() == 0 {
            return out;
        }

        let input = input.remix(input.channel_count().min(2));
        let in_channels = input.channel_count();
        self.ensure_lanes(in_channels);

        for lane_idx in 0..in_channels {
            self.push_block(lane_idx, input.channel(lane_idx));
        }

        let norm = 1.0 / self.fft_size as f32;
        for c in 0..out_channels {
            let lane_idx = if in_channels == 1 { 0 } else { c.min(in_channels - 1) };
            self.accum.fill(Complex::new(0.0, 0.0));
            let lane = &self.lanes[lane_idx];
            for (x, h) in lane.spectra.iter().zip(&self.partitions[c]) {
                for ((acc, xb), hb) in self.accum.iter_mut().zip(x).zip(h) {
                    *acc += xb * hb;
                }
            }
            self.inverse.process_with_scratch(&mut self.accum, &mut self.scratch);
            for (dst, y) in out.channel_mut(c).iter_mut().zip(&self.accum[self.block..]) {
                *dst = y.re * norm;
            }
        }
        out
    }

    /// Drop all buffered input so the tail stops immediately.
    pub fn reset(&mut self) {
        self.lanes.clear();
    }

    fn ensure_lanes(&mut self, count: usize) {
        let parts = self.partition_count();
        while self.lanes.len() < count {
            self.lanes.push(InputLane {
                history: vec![0.0; self.fft_size],
                spectra: VecDeque::with_capacity(parts + 1),
            });
        }
    }

    fn push_block(&mut self, lane_idx: usize, samples: &[f32]) {
        let block = self.block;
        let parts = self.partition_count();
        let lane = &mut self.lanes[lane_idx];

        lane.history.copy_within(block.., 0);
        lane.history[block..].fill(0.0);
        lane.history[block..block + samples.len().min(block)]
            .copy_from_slice(&samples[..samples.len().min(block)]);

        for (w, &s) in self.work.iter_mut().zip(&lane.history) {
            *w = Complex::new(s, 0.0);
        }
        self.forward.process_with_scratch(&mut self.work, &mut self.scratch);

        let spectrum = if lane.spectra.len() == parts {
            let mut recycled = lane.spectra.pop_back().unwrap_or_default();
            recycled.clear();
            recycled.extend_from_slice(&self.work);
            recycled
        } else {
            self.work.clone()
        };
        lane.spectra.push_front(spectrum);
    }
}
