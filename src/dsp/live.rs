//! Live playback: processed preview pulled by a real-time host.
//!
//! The host (an AudioWorklet through the WASM bindings, or a native output
//! callback) calls [`LivePlayback::process`] for every output buffer. The
//! effect chain is built once and kept, like an always-on audio context, so
//! reverb and echo tails keep ringing after a source ends. At most one source
//! plays at a time: starting a new one stops and drops the previous one.
//!
//! A source is routed either through the chain ([`Route::Processed`]) or
//! straight to the output ([`Route::Raw`], the unprocessed preview). Both
//! routes pass the analyser on the way out.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::params::{ParamUpdate, ParameterSet};

use super::analyser::Analyser;
use super::buffer::{AudioBlock, SampleBuffer};
use super::chain::{Chain, ChainContext, ChainSpec};
use super::impulse;
use super::source::{BufferSource, SourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Where the active source is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Through the effect chain.
    Processed,
    /// Directly to the output, bypassing every effect.
    Raw,
}

/// Something the host may want to react to (e.g. re-enable a button).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The active source ran out of samples.
    Ended,
}

pub struct LivePlayback {
    config: EngineConfig,
    sample_rate: f64,
    channels: usize,
    /// Current values, applied to the chain on build and kept in sync by `apply`.
    params: ParameterSet,
    chain: Option<Chain>,
    active: Option<BufferSource>,
    route: Route,
    analyser: Analyser,
    /// Leftover frames of the last rendered quantum, interleaved.
    pending: Vec<f32>,
}

impl std::fmt::Debug for LivePlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePlayback")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("state", &self.state())
            .field("route", &self.route())
            .finish()
    }
}

impl LivePlayback {
    /// Playback for an output running at `sample_rate`. The config must pass
    /// [`EngineConfig::validate`] and the rate must be positive.
    pub fn new(sample_rate: f64, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ConfigError::Invalid(format!("live sample rate must be positive, got {sample_rate}")));
        }
        let channels = config.live_channels;
        let analyser = Analyser::new(config.analyser_fft_size);
        Ok(LivePlayback {
            config,
            sample_rate,
            channels,
            params: ParameterSet::default(),
            chain: None,
            active: None,
            route: Route::Processed,
            analyser,
            pending: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn state(&self) -> PlaybackState {
        match self.active {
            Some(_) => PlaybackState::Playing,
            None => PlaybackState::Idle,
        }
    }

    /// Route of the active source, `None` when idle.
    pub fn route(&self) -> Option<Route> {
        self.active.as_ref().map(|_| self.route)
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    /// Start processed playback of `buffer` with `params`.
    ///
    /// Any active source is stopped and discarded first.
    pub fn start(&mut self, buffer: Arc<SampleBuffer>, params: &ParameterSet) {
        self.stop();
        self.params = *params;

        match self.chain.as_mut() {
            Some(chain) => {
                for update in params.updates() {
                    chain.apply(&update);
                }
            }
            None => self.chain = Some(self.build_chain()),
        }

        self.play(buffer, params.pitch, Route::Processed);
    }

    /// Play `buffer` as recorded, bypassing the chain. Any active source is
    /// stopped first; chain tails keep ringing underneath.
    pub fn start_raw(&mut self, buffer: Arc<SampleBuffer>) {
        self.stop();
        self.play(buffer, 1.0, Route::Raw);
    }

    fn play(&mut self, buffer: Arc<SampleBuffer>, rate: f64, route: Route) {
        let mut source = BufferSource::new(buffer, self.sample_rate);
        source.set_playback_rate(rate);
        if let Err(e) = source.start(0.0) {
            log::warn!("live source failed to start: {e}");
            return;
        }
        log::debug!("live playback started ({route:?}) at rate {}", source.playback_rate());
        self.route = route;
        self.active = Some(source);
    }

    /// Stop the active source, if any. Stopping when idle is a no-op.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.active.take() {
            if let Err(e) = source.stop() {
                log::trace!("ignoring stop on finished source: {e}");
            }
            log::debug!("live playback stopped");
        }
    }

    /// Forward a parameter change into the live chain. Pitch is picked up by
    /// the next `start`.
    pub fn apply(&mut self, update: &ParamUpdate) {
        *self.params.slot(update.param) = update.value;
        if let Some(chain) = self.chain.as_mut() {
            chain.apply(update);
        }
    }

    /// Fill `out` (interleaved, `channels()` wide) with the next frames of
    /// processed audio. Returns [`PlaybackEvent::Ended`] when the active
    /// source finished during this call; the engine is Idle afterwards.
    pub fn process(&mut self, out: &mut [f32]) -> Option<PlaybackEvent> {
        let channels = self.channels;
        let mut written = 0;
        let mut event = None;

        // Drain what is left of the previous quantum first
        let take = self.pending.len().min(out.len());
        out[..take].copy_from_slice(&self.pending[..take]);
        self.pending.drain(..take);
        written += take;

        while written < out.len() {
            let (block, ended) = self.render_quantum();
            if ended {
                event = Some(PlaybackEvent::Ended);
            }
            let mut interleaved = vec![0.0; block.frames() * channels];
            block.write_interleaved(&mut interleaved, channels, 0);
            let take = interleaved.len().min(out.len() - written);
            out[written..written + take].copy_from_slice(&interleaved[..take]);
            self.pending.extend_from_slice(&interleaved[take..]);
            written += take;
        }
        event
    }

    fn render_quantum(&mut self) -> (AudioBlock, bool) {
        let quantum = self.config.render_quantum;
        let route = self.route;
        let mut ended = false;
        let input = match self.active.as_mut() {
            Some(source) => {
                let block = source.render(quantum);
                if source.state() == SourceState::Finished {
                    ended = true;
                }
                block
            }
            None => AudioBlock::silent(1, quantum),
        };
        if ended {
            self.active = None;
            log::debug!("live source ended");
        }

        let (chain_input, direct) = match route {
            Route::Processed => (input, None),
            Route::Raw => (AudioBlock::silent(1, quantum), Some(input)),
        };
        let mut output = match self.chain.as_mut() {
            Some(chain) => chain.process(chain_input).remix(self.channels),
            None => AudioBlock::silent(self.channels, quantum),
        };
        if let Some(raw) = direct {
            output.mix_in(&raw.remix(self.channels));
        }
        self.analyser.observe(&output);
        (output, ended)
    }

    fn build_chain(&self) -> Chain {
        let spec = ChainSpec::from_params(&self.params, &self.config);
        let impulse = impulse::generate(
            self.config.impulse_duration,
            self.config.impulse_decay,
            self.sample_rate as u32,
            self.config.impulse_channels,
        );
        let context = ChainContext { sample_rate: self.sample_rate, quantum: self.config.render_quantum };
        Chain::build(&spec, context, &impulse)
    }
}
