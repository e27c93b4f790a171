//! Offline renderer: runs the effect chain faster than real time.
//!
//! The output length is fixed up front from the decoded input
//! (`ceil(duration * sample_rate)` frames, one channel) and does not depend on
//! the pitch parameter: a faster playback rate leaves trailing effect tail or
//! silence, a slower one is cut at the original length.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, RenderError};
use crate::params::ParameterSet;
use crate::wav::RenderedWav;

use super::buffer::{AudioBlock, SampleBuffer};
use super::chain::{Chain, ChainContext, ChainSpec};
use super::impulse::{self, ImpulseResponse};
use super::source::BufferSource;

/// Channels of an offline render.
pub const OFFLINE_CHANNELS: usize = 1;

/// Frames needed to hold `duration` seconds at `sample_rate`.
///
/// Products within a hair of an integer are treated as that integer so that
/// a buffer's own duration maps back to its exact frame count.
pub fn render_length(duration: f64, sample_rate: u32) -> usize {
    let exact = duration * sample_rate as f64;
    let nearest = exact.round();
    if (exact - nearest).abs() < 1e-6 {
        nearest as usize
    } else {
        exact.ceil() as usize
    }
}

/// Renders recordings through the effect chain into finished buffers.
#[derive(Debug, Clone, Default)]
pub struct OfflineRenderer {
    config: EngineConfig,
}

impl OfflineRenderer {
    /// A renderer for `config`, which must pass [`EngineConfig::validate`].
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(OfflineRenderer { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render `input` with `params` into a mono buffer of exactly
    /// `render_length(input.duration(), input.sample_rate())` frames.
    pub fn render(&self, input: &Arc<SampleBuffer>, params: &ParameterSet) -> Result<RenderedWav, RenderError> {
        let sample_rate = input.sample_rate();
        let ir = impulse::generate(
            self.config.impulse_duration,
            self.config.impulse_decay,
            sample_rate,
            self.config.impulse_channels,
        );
        self.render_with_impulse(input, params, &ir)
    }

    /// Like [`render`](Self::render) with a caller-supplied impulse response.
    pub fn render_with_impulse(
        &self,
        input: &Arc<SampleBuffer>,
        params: &ParameterSet,
        ir: &ImpulseResponse,
    ) -> Result<RenderedWav, RenderError> {
        let params = params.checked()?;
        let sample_rate = input.sample_rate();
        if sample_rate == 0 {
            return Err(RenderError::InvalidSampleRate(sample_rate));
        }
        if input.channel_count() == 0 {
            return Err(RenderError::NoChannels);
        }
        if input.is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let length = render_length(input.duration(), sample_rate);
        let quantum = self.config.render_quantum;
        let context = ChainContext { sample_rate: sample_rate as f64, quantum };
        let spec = ChainSpec::from_params(&params, &self.config);
        let mut chain = Chain::build(&spec, context, ir);

        let mut source = BufferSource::new(Arc::clone(input), sample_rate as f64);
        source.set_playback_rate(chain.playback_rate());
        source.start(0.0)?;

        log::debug!(
            "offline render: {length} frames at {sample_rate} Hz, pitch {}",
            params.pitch
        );

        let mut output = Vec::with_capacity(length);
        while output.len() < length {
            let block = chain.process(source.render(quantum));
            let mono: AudioBlock = block.remix(OFFLINE_CHANNELS);
            let take = (length - output.len()).min(mono.frames());
            output.extend_from_slice(&mono.channel(0)[..take]);
        }

        Ok(RenderedWav::new(SampleBuffer::mono(output, sample_rate)))
    }

    /// Render on tokio's blocking pool so independent exports can run
    /// concurrently without stalling the async runtime.
    #[cfg(feature = "native")]
    pub async fn render_async(
        &self,
        input: Arc<SampleBuffer>,
        params: ParameterSet,
    ) -> Result<RenderedWav, RenderError> {
        let renderer = self.clone();
        tokio::task::spawn_blocking(move || renderer.render(&input, &params))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_renderer() -> OfflineRenderer {
        OfflineRenderer::new(EngineConfig { impulse_duration: 0.1, ..EngineConfig::default() }).unwrap()
    }

    fn tone(frames: usize, rate: u32) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::mono(
            (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect(),
            rate,
        ))
    }

    #[test]
    fn render_length_is_exact_for_whole_frames() {
        assert_eq!(render_length(0.5, 44100), 22050);
        assert_eq!(render_length(1001.0 / 8000.0, 8000), 1001);
        assert_eq!(render_length(0.10001, 1000), 101);
    }

    #[test]
    fn output_length_matches_input_duration() {
        let input = tone(12345, 8000);
        let out = test_renderer().render(&input, &ParameterSet::default()).unwrap();
        assert_eq!(out.buffer().frames(), 12345);
        assert_eq!(out.buffer().channel_count(), 1);
        assert_eq!(out.buffer().sample_rate(), 8000);
    }

    #[test]
    fn output_length_independent_of_pitch() {
        let input = tone(5000, 8000);
        let renderer = test_renderer();
        for pitch in [0.5, 0.9, 1.0, 1.5, 2.0] {
            let params = ParameterSet { pitch, ..ParameterSet::default() };
            let out = renderer.render(&input, &params).unwrap();
            assert_eq!(out.buffer().frames(), 5000, "pitch {pitch}");
        }
    }

    #[test]
    fn not_multiple_of_quantum() {
        let input = tone(130, 8000);
        let out = test_renderer().render(&input, &ParameterSet::default()).unwrap();
        assert_eq!(out.buffer().frames(), 130);
    }

    #[test]
    fn stereo_input_renders_mono() {
        let left: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.05).sin()).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let input = Arc::new(SampleBuffer::new(vec![left, right], 8000));
        let params = ParameterSet { reverb_mix: 0.0, ..ParameterSet::default() };
        let out = test_renderer().render(&input, &params).unwrap();
        // Opposite channels cancel on the mono downmix
        assert!(out.buffer().channel(0).iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn dry_render_is_input_plus_echoes() {
        let input = Arc::new(SampleBuffer::mono(
            (0..4000).map(|i| (i as f32 * 0.5).sin() * 0.5).collect(),
            8000,
        ));
        let params = ParameterSet { reverb_mix: 0.0, ..ParameterSet::default() };
        let out = test_renderer().render(&input, &params).unwrap();
        let data = out.buffer().channel(0);
        let x = input.channel(0);
        // Delay time 0 still sits one quantum late inside the feedback loop
        let lag = 128;
        for i in 1000..1100 {
            let mut expected = 0.0;
            let mut gain = 1.0;
            let mut k = 1;
            while i >= lag * k {
                expected += gain * x[i - lag * k];
                gain *= 0.3;
                k += 1;
            }
            assert!((data[i] - expected).abs() < 0.05, "frame {i}: {} vs {expected}", data[i]);
        }
    }

    #[test]
    fn same_impulse_renders_identically() {
        let input = tone(3000, 8000);
        let ir = impulse::generate(0.1, 2.0, 8000, 2);
        let renderer = test_renderer();
        let params = ParameterSet::default();
        let a = renderer.render_with_impulse(&input, &params, &ir).unwrap();
        let b = renderer.render_with_impulse(&input, &params, &ir).unwrap();
        assert_eq!(a.buffer(), b.buffer());
    }

    #[test]
    fn rejects_empty_and_invalid_input() {
        let renderer = test_renderer();
        let params = ParameterSet::default();
        let empty = Arc::new(SampleBuffer::mono(Vec::new(), 8000));
        assert!(matches!(renderer.render(&empty, &params), Err(RenderError::EmptyInput)));
        let no_rate = Arc::new(SampleBuffer::mono(vec![0.0; 10], 0));
        assert!(matches!(renderer.render(&no_rate, &params), Err(RenderError::InvalidSampleRate(0))));
        let no_channels = Arc::new(SampleBuffer::new(Vec::new(), 8000));
        assert!(matches!(renderer.render(&no_channels, &params), Err(RenderError::NoChannels)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let zero_quantum = EngineConfig { render_quantum: 0, ..EngineConfig::default() };
        assert!(matches!(OfflineRenderer::new(zero_quantum), Err(ConfigError::Invalid(_))));
        let no_impulse_channels = EngineConfig { impulse_channels: 0, ..EngineConfig::default() };
        assert!(OfflineRenderer::new(no_impulse_channels).is_err());
        assert!(OfflineRenderer::new(EngineConfig::default()).is_ok());
    }

    #[test]
    fn non_finite_params_are_rejected() {
        let input = tone(1000, 8000);
        let renderer = test_renderer();
        let nan_cutoff = ParameterSet { lowpass_hz: f64::NAN, ..ParameterSet::default() };
        assert!(matches!(
            renderer.render(&input, &nan_cutoff),
            Err(RenderError::Params(crate::error::ParamError::NotFinite { .. }))
        ));
        let infinite_gain = ParameterSet { gain: f64::INFINITY, ..ParameterSet::default() };
        assert!(renderer.render(&input, &infinite_gain).is_err());
        // Out-of-range but finite values are clamped, not rejected
        let loud = ParameterSet { gain: 100.0, pitch: 0.01, ..ParameterSet::default() };
        assert_eq!(renderer.render(&input, &loud).unwrap().buffer().frames(), 1000);
    }

    #[test]
    fn hall_preset_stays_finite() {
        let input = tone(8000, 8000);
        let hall = crate::preset::PresetBank::default().get("hall").unwrap().params;
        let out = test_renderer().render(&input, &hall).unwrap();
        assert!(out.buffer().channel(0).iter().all(|s| s.is_finite()));
    }

    #[cfg(feature = "native")]
    #[tokio::test]
    async fn async_renders_run_concurrently() {
        let renderer = test_renderer();
        let input = tone(4000, 8000);
        let (a, b) = tokio::join!(
            renderer.render_async(Arc::clone(&input), ParameterSet::default()),
            renderer.render_async(Arc::clone(&input), ParameterSet { pitch: 2.0, ..ParameterSet::default() }),
        );
        assert_eq!(a.unwrap().buffer().frames(), 4000);
        assert_eq!(b.unwrap().buffer().frames(), 4000);
    }
}
