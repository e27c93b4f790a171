//! Signal chain: the one effect topology shared by live and offline paths.
//!
//! A [`ChainSpec`] is a declarative, ordered list of stages derived from a
//! [`ParameterSet`]. [`Chain::build`] instantiates it for a given context
//! (sample rate + block size) so live preview and offline export cannot drift
//! apart:
//!
//! ```text
//! source (rate = pitch)
//!   -> lowpass -> highpass -> delay (+ feedback loop)
//!   -> [ dry * (1 - mix) + convolver * mix ]
//!   -> master gain -> destination
//! ```

use crate::config::EngineConfig;
use crate::params::{Param, ParamUpdate, ParameterSet};

use super::buffer::{AudioBlock, SampleBuffer};
use super::convolver::Convolver;
use super::delay::FeedbackDelay;
use super::filter::{BiquadFilter, FilterType};

/// Configuration of a single processing stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSpec {
    Lowpass { frequency: f64 },
    Highpass { frequency: f64 },
    FeedbackDelay { time: f64, feedback: f64, max_delay: f64 },
    /// Split into dry and convolved paths, weighted by `mix`, and sum.
    ReverbMix { mix: f64 },
    Gain { gain: f64 },
}

/// The full chain description: source rate plus ordered stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    pub playback_rate: f64,
    pub stages: Vec<StageSpec>,
}

impl ChainSpec {
    /// The recorder's fixed topology for the given parameter values.
    pub fn from_params(params: &ParameterSet, config: &EngineConfig) -> Self {
        ChainSpec {
            playback_rate: params.pitch,
            stages: vec![
                StageSpec::Lowpass { frequency: params.lowpass_hz },
                StageSpec::Highpass { frequency: params.highpass_hz },
                StageSpec::FeedbackDelay {
                    time: params.delay_time_sec,
                    feedback: config.feedback_gain,
                    max_delay: config.max_delay,
                },
                StageSpec::ReverbMix { mix: params.reverb_mix },
                StageSpec::Gain { gain: params.gain },
            ],
        }
    }
}

/// Where a chain runs: its sample rate and the frames per block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainContext {
    pub sample_rate: f64,
    pub quantum: usize,
}

#[derive(Debug)]
enum Stage {
    Filter {
        filter_type: FilterType,
        frequency: f64,
        sample_rate: f64,
        lanes: Vec<BiquadFilter>,
    },
    Delay {
        time: f64,
        feedback: f64,
        max_delay: f64,
        min_delay: usize,
        sample_rate: f64,
        lanes: Vec<FeedbackDelay>,
    },
    ReverbMix {
        dry: f32,
        wet: f32,
        convolver: Convolver,
    },
    Gain(f32),
}

impl Stage {
    fn build(spec: &StageSpec, ctx: &ChainContext, impulse: &SampleBuffer) -> Stage {
        match *spec {
            StageSpec::Lowpass { frequency } => Stage::Filter {
                filter_type: FilterType::Lowpass,
                frequency,
                sample_rate: ctx.sample_rate,
                lanes: Vec::new(),
            },
            StageSpec::Highpass { frequency } => Stage::Filter {
                filter_type: FilterType::Highpass,
                frequency,
                sample_rate: ctx.sample_rate,
                lanes: Vec::new(),
            },
            StageSpec::FeedbackDelay { time, feedback, max_delay } => Stage::Delay {
                time,
                feedback,
                max_delay,
                // A delay inside a cycle is at least one block long
                min_delay: if feedback != 0.0 { ctx.quantum } else { 0 },
                sample_rate: ctx.sample_rate,
                lanes: Vec::new(),
            },
            StageSpec::ReverbMix { mix } => Stage::ReverbMix {
                dry: (1.0 - mix) as f32,
                wet: mix as f32,
                convolver: Convolver::new(impulse, ctx.quantum, true),
            },
            StageSpec::Gain { gain } => Stage::Gain(gain as f32),
        }
    }

    fn process(&mut self, mut block: AudioBlock) -> AudioBlock {
        match self {
            Stage::Filter { filter_type, frequency, sample_rate, lanes } => {
                while lanes.len() < block.channel_count() {
                    lanes.push(BiquadFilter::new(*filter_type, *frequency, *sample_rate));
                }
                for (ch, filter) in block.channels_mut().zip(lanes.iter_mut()) {
                    filter.process_block(ch);
                }
                block
            }
            Stage::Delay { time, feedback, max_delay, min_delay, sample_rate, lanes } => {
                while lanes.len() < block.channel_count() {
                    lanes.push(FeedbackDelay::with_params(
                        *sample_rate,
                        *max_delay,
                        *min_delay,
                        *time,
                        *feedback,
                    ));
                }
                for (ch, line) in block.channels_mut().zip(lanes.iter_mut()) {
                    line.process_block(ch);
                }
                block
            }
            Stage::ReverbMix { dry, wet, convolver } => {
                let mut wet_block = convolver.process(&block);
                wet_block.scale(*wet);
                block.scale(*dry);
                block.mix_in(&wet_block);
                block
            }
            Stage::Gain(gain) => {
                block.scale(*gain);
                block
            }
        }
    }

    /// Push a parameter change into this stage. Returns whether it applied.
    fn apply(&mut self, update: &ParamUpdate) -> bool {
        match (self, update.param) {
            (Stage::Filter { filter_type: FilterType::Lowpass, frequency, lanes, .. }, Param::Lowpass)
            | (Stage::Filter { filter_type: FilterType::Highpass, frequency, lanes, .. }, Param::Highpass) => {
                *frequency = update.value;
                for filter in lanes.iter_mut() {
                    filter.set_frequency(update.value);
                }
                true
            }
            (Stage::Delay { time, lanes, .. }, Param::DelayTime) => {
                *time = update.value;
                for line in lanes.iter_mut() {
                    line.set_delay_time(update.value);
                }
                true
            }
            (Stage::ReverbMix { dry, wet, .. }, Param::ReverbMix) => {
                *wet = update.value as f32;
                *dry = (1.0 - update.value) as f32;
                true
            }
            (Stage::Gain(gain), Param::Gain) => {
                *gain = update.value as f32;
                true
            }
            _ => false,
        }
    }
}

/// An instantiated chain. Feed it one block of `quantum` frames at a time.
#[derive(Debug)]
pub struct Chain {
    context: ChainContext,
    playback_rate: f64,
    stages: Vec<Stage>,
}

impl Chain {
    /// Instantiate `spec` in `context`. The impulse response is generated by
    /// the caller once per chain and moved into the convolver's spectra here.
    pub fn build(spec: &ChainSpec, context: ChainContext, impulse: &SampleBuffer) -> Chain {
        let stages = spec
            .stages
            .iter()
            .map(|s| Stage::build(s, &context, impulse))
            .collect();
        log::debug!(
            "built chain: {} stages at {} Hz, quantum {}",
            spec.stages.len(),
            context.sample_rate,
            context.quantum
        );
        Chain { context, playback_rate: spec.playback_rate, stages }
    }

    pub fn context(&self) -> ChainContext {
        self.context
    }

    /// Rate to apply to the source feeding this chain.
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn process(&mut self, block: AudioBlock) -> AudioBlock {
        self.stages.iter_mut().fold(block, |block, stage| stage.process(block))
    }

    /// Apply a parameter change to every stage it concerns. Pitch only
    /// affects the next source started on this chain.
    pub fn apply(&mut self, update: &ParamUpdate) -> bool {
        if update.param == Param::Pitch {
            self.playback_rate = update.value;
            return false;
        }
        let mut applied = false;
        for stage in self.stages.iter_mut() {
            applied |= stage.apply(update);
        }
        applied
    }
}
