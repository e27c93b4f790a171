//! Buffer playback source.
//!
//! Reads a [`SampleBuffer`] at a playback rate via linear interpolation.
//! A rate above 1.0 raises pitch and shortens playback; below 1.0 does the
//! opposite. If the buffer's sample rate differs from the context's, the
//! read step is scaled so that a rate of 1.0 still plays at original speed.

use std::sync::Arc;

use super::buffer::{AudioBlock, SampleBuffer};
use crate::error::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unstarted,
    Playing,
    /// Stopped explicitly or ran out of samples.
    Finished,
}

#[derive(Debug, Clone)]
pub struct BufferSource {
    buffer: Arc<SampleBuffer>,
    /// Current read position in the buffer (fractional frames).
    position: f64,
    playback_rate: f64,
    /// Buffer sample rate / context sample rate.
    sample_rate_ratio: f64,
    state: SourceState,
}

impl BufferSource {
    pub fn new(buffer: Arc<SampleBuffer>, context_sample_rate: f64) -> Self {
        let sample_rate_ratio = if context_sample_rate > 0.0 {
            buffer.sample_rate() as f64 / context_sample_rate
        } else {
            1.0
        };
        BufferSource {
            buffer,
            position: 0.0,
            playback_rate: 1.0,
            sample_rate_ratio,
            state: SourceState::Unstarted,
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate.max(0.0);
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn channel_count(&self) -> usize {
        self.buffer.channel_count()
    }

    /// Begin playback `offset` seconds into the buffer.
    pub fn start(&mut self, offset: f64) -> Result<(), SourceError> {
        if self.state != SourceState::Unstarted {
            return Err(SourceError::AlreadyStarted);
        }
        self.position = (offset.max(0.0) * self.buffer.sample_rate() as f64).min(self.buffer.frames() as f64);
        self.state = SourceState::Playing;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), SourceError> {
        match self.state {
            SourceState::Unstarted => Err(SourceError::NotStarted),
            SourceState::Finished => Err(SourceError::AlreadyStopped),
            SourceState::Playing => {
                self.state = SourceState::Finished;
                Ok(())
            }
        }
    }

    /// Produce the next `frames` frames. Frames past the end of the buffer,
    /// or while not playing, are silent.
    pub fn render(&mut self, frames: usize) -> AudioBlock {
        let mut block = AudioBlock::silent(self.buffer.channel_count(), frames);
        if self.state != SourceState::Playing {
            return block;
        }

        let len = self.buffer.frames() as f64;
        let step = self.playback_rate * self.sample_rate_ratio;
        for i in 0..frames {
            if self.position >= len {
                self.state = SourceState::Finished;
                break;
            }
            for c in 0..self.buffer.channel_count() {
                block.channel_mut(c)[i] = self.buffer.read_interpolated(c, self.position);
            }
            self.position += step;
        }
        if self.position >= len {
            self.state = SourceState::Finished;
        }
        block
    }
}
