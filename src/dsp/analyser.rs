//! Waveform tap for the live display.
//!
//! Keeps the most recent `fft_size` samples (down-mixed to mono) of whatever
//! passes through it, and exposes them the way a browser AnalyserNode does.
//! The tap never alters the signal.

use std::collections::VecDeque;

use super::buffer::AudioBlock;

#[derive(Debug, Clone)]
pub struct Analyser {
    fft_size: usize,
    window: VecDeque<f32>,
}

impl Analyser {
    pub fn new(fft_size: usize) -> Self {
        Analyser { fft_size, window: VecDeque::from(vec![0.0; fft_size]) }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Record a block that just went to the output.
    pub fn observe(&mut self, block: &AudioBlock) {
        let mono = block.remix(1);
        for &s in mono.channel(0) {
            self.window.push_back(s);
            while self.window.len() > self.fft_size {
                self.window.pop_front();
            }
        }
    }

    /// Clear the window back to silence.
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|s| *s = 0.0);
    }

    /// The latest `fft_size` samples, oldest first.
    pub fn float_time_domain(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }

    /// Samples as unsigned bytes, 128 meaning silence.
    pub fn byte_time_domain(&self) -> Vec<u8> {
        self.window.iter().map(|&s| sample_to_byte(s)).collect()
    }

    /// Points of the waveform line for a canvas of the given size: one point
    /// per sample, spread evenly across the width, ending at the vertical
    /// centre of the right edge.
    pub fn polyline(&self, width: f32, height: f32) -> Vec<(f32, f32)> {
        let bytes = self.byte_time_domain();
        let slice = width / bytes.len().max(1) as f32;
        let mut points: Vec<(f32, f32)> = bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                let v = b as f32 / 128.0;
                (i as f32 * slice, v * height / 2.0)
            })
            .collect();
        points.push((width, height / 2.0));
        points
    }
}

fn sample_to_byte(sample: f32) -> u8 {
    (128.0 * (sample + 1.0)).floor().clamp(0.0, 255.0) as u8
}
