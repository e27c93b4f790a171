//! One recorder session: the current recording, the knob values, processed
//! preview and exports.
//!
//! Every parameter change goes through the [`ParameterStore`] first and is
//! then forwarded to the live chain, so the preview always reflects the
//! knobs. Offline exports take a snapshot of the store.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dsp::analyser::Analyser;
use crate::dsp::buffer::SampleBuffer;
use crate::dsp::live::{LivePlayback, PlaybackEvent, PlaybackState, Route};
use crate::dsp::renderer::OfflineRenderer;
use crate::error::{ConfigError, ExportError, ExportResult, ParamError};
use crate::export::{self, ExportKind, FileSink};
use crate::params::{Param, ParamUpdate, ParameterSet, ParameterStore};
use crate::preset::PresetBank;

#[derive(Debug)]
pub struct Session {
    store: ParameterStore,
    presets: PresetBank,
    live: LivePlayback,
    renderer: OfflineRenderer,
    recording: Option<Arc<SampleBuffer>>,
}

impl Session {
    /// A session whose live preview runs at `sample_rate`.
    pub fn new(sample_rate: f64, config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Session {
            store: ParameterStore::default(),
            presets: PresetBank::default(),
            live: LivePlayback::new(sample_rate, config.clone())?,
            renderer: OfflineRenderer::new(config)?,
            recording: None,
        })
    }

    /// Replace the current recording. A processed preview of the previous
    /// one keeps playing until stopped or ended.
    pub fn load_recording(&mut self, buffer: SampleBuffer) {
        log::debug!(
            "loaded recording: {:.3}s, {} ch at {} Hz",
            buffer.duration(),
            buffer.channel_count(),
            buffer.sample_rate()
        );
        self.recording = Some(Arc::new(buffer));
    }

    /// Decode captured bytes and make them the current recording.
    #[cfg(feature = "decode")]
    pub fn load_recording_bytes(&mut self, bytes: &[u8]) -> Result<(), crate::error::DecodeError> {
        let buffer = crate::decode::decode(bytes)?;
        self.load_recording(buffer);
        Ok(())
    }

    pub fn recording(&self) -> Option<&Arc<SampleBuffer>> {
        self.recording.as_ref()
    }

    pub fn has_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn params(&self) -> ParameterSet {
        self.store.snapshot()
    }

    pub fn presets(&self) -> &PresetBank {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetBank {
        &mut self.presets
    }

    /// Set one knob. The clamped value reaches the live chain immediately.
    pub fn set_param(&mut self, param: Param, value: f64) -> Result<ParamUpdate, ParamError> {
        let update = self.store.set(param, value)?;
        self.live.apply(&update);
        Ok(update)
    }

    /// Like [`set_param`](Self::set_param), addressed by the page's key.
    pub fn set_param_by_key(&mut self, key: &str, value: f64) -> Result<ParamUpdate, ParamError> {
        self.set_param(Param::from_key(key)?, value)
    }

    /// Set a knob from its rotation angle in degrees.
    pub fn set_param_angle(&mut self, param: Param, angle: f64) -> Result<ParamUpdate, ParamError> {
        if !angle.is_finite() {
            return Err(ParamError::NotFinite { param, value: angle });
        }
        self.set_param(param, param.value_for_angle(angle))
    }

    /// Apply a named preset. Either all six values change or, for an unknown
    /// name, none do.
    pub fn apply_preset(&mut self, name: &str) -> Result<ParameterSet, ParamError> {
        let params = self.presets.get(name)?.params;
        for update in self.store.replace(params) {
            self.live.apply(&update);
        }
        log::debug!("applied preset '{name}'");
        Ok(self.store.snapshot())
    }

    /// Start the processed preview of the current recording with the current
    /// values. Returns `false` when there is nothing to play.
    pub fn play_processed(&mut self) -> bool {
        let Some(recording) = self.recording.clone() else {
            log::debug!("play requested without a recording");
            return false;
        };
        let params = self.store.snapshot();
        self.live.start(recording, &params);
        true
    }

    /// Play the current recording as captured, without effects. A running
    /// processed preview is stopped first. Returns `false` when there is
    /// nothing to play.
    pub fn play_raw(&mut self) -> bool {
        let Some(recording) = self.recording.clone() else {
            log::debug!("raw play requested without a recording");
            return false;
        };
        self.live.start_raw(recording);
        true
    }

    /// Route of whatever is playing, `None` when idle.
    pub fn playing_route(&self) -> Option<Route> {
        self.live.route()
    }

    pub fn stop_processed(&mut self) {
        self.live.stop();
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.live.state()
    }

    /// Pull the next interleaved output frames from the live preview.
    pub fn process(&mut self, out: &mut [f32]) -> Option<PlaybackEvent> {
        self.live.process(out)
    }

    pub fn analyser(&self) -> &Analyser {
        self.live.analyser()
    }

    pub fn live(&self) -> &LivePlayback {
        &self.live
    }

    /// Encode the export of `kind` without saving it.
    pub fn export_bytes(&self, kind: ExportKind) -> ExportResult<Vec<u8>> {
        let recording = self.recording.as_ref().ok_or(ExportError::NoRecording)?;
        match kind {
            ExportKind::Raw => export::export_raw(recording),
            ExportKind::WithEffects => {
                export::export_with_effects(&self.renderer, recording, &self.store.snapshot())
            }
        }
    }

    /// Export the current recording to `sink`. Returns the file name used.
    pub fn export(&self, kind: ExportKind, sink: &mut dyn FileSink) -> ExportResult<&'static str> {
        let recording = self.recording.as_ref().ok_or(ExportError::NoRecording)?;
        export::export_to(kind, &self.renderer, recording, &self.store.snapshot(), sink)
    }

    /// Render the with-effects export on tokio's blocking pool.
    #[cfg(feature = "native")]
    pub async fn export_async(&self, kind: ExportKind, sink: &mut dyn FileSink) -> ExportResult<&'static str> {
        let recording = self.recording.clone().ok_or(ExportError::NoRecording)?;
        let bytes = match kind {
            ExportKind::Raw => export::export_raw(&recording)?,
            ExportKind::WithEffects => {
                let rendered = self.renderer.render_async(recording, self.store.snapshot()).await?;
                rendered.to_bytes()?
            }
        };
        let file_name = kind.file_name();
        sink.save(&bytes, file_name)?;
        Ok(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemorySink;

    fn session() -> Session {
        Session::new(8000.0, EngineConfig { impulse_duration: 0.05, analyser_fft_size: 256, ..EngineConfig::default() })
            .unwrap()
    }

    fn recording(frames: usize) -> SampleBuffer {
        SampleBuffer::mono((0..frames).map(|i| (i as f32 * 0.3).sin() * 0.5).collect(), 8000)
    }

    #[test]
    fn hall_preset_applies_atomically() {
        let mut s = session();
        let p = s.apply_preset("hall").unwrap();
        assert_eq!(p.gain, 1.0);
        assert_eq!(p.pitch, 1.0);
        assert_eq!(p.lowpass_hz, 18000.0);
        assert_eq!(p.highpass_hz, 80.0);
        assert_eq!(p.delay_time_sec, 0.25);
        assert_eq!(p.reverb_mix, 0.7);
        assert_eq!(s.params(), p);
    }

    #[test]
    fn unknown_preset_changes_nothing() {
        let mut s = session();
        s.set_param(Param::Gain, 2.0).unwrap();
        let before = s.params();
        assert!(matches!(s.apply_preset("cathedral"), Err(ParamError::UnknownPreset(_))));
        assert_eq!(s.params(), before);
    }

    #[test]
    fn set_param_by_key_and_angle() {
        let mut s = session();
        s.set_param_by_key("reverbMix", 0.6).unwrap();
        assert_eq!(s.params().reverb_mix, 0.6);
        assert!(s.set_param_by_key("echo", 1.0).is_err());
        s.set_param_angle(Param::Pitch, 135.0).unwrap();
        assert_eq!(s.params().pitch, 2.0);
        assert!(s.set_param_angle(Param::Pitch, f64::NAN).is_err());
    }

    #[test]
    fn play_requires_recording() {
        let mut s = session();
        assert!(!s.play_processed());
        assert_eq!(s.playback_state(), PlaybackState::Idle);
        s.load_recording(recording(4000));
        assert!(s.play_processed());
        assert_eq!(s.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let zero_quantum = EngineConfig { render_quantum: 0, ..EngineConfig::default() };
        assert!(Session::new(8000.0, zero_quantum).is_err());
        let no_channels = EngineConfig { live_channels: 0, ..EngineConfig::default() };
        assert!(Session::new(8000.0, no_channels).is_err());
        let no_window = EngineConfig { analyser_fft_size: 0, ..EngineConfig::default() };
        assert!(matches!(Session::new(8000.0, no_window), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn raw_play_stops_processed_preview() {
        let mut s = session();
        assert!(!s.play_raw());
        s.load_recording(recording(8000));
        assert!(s.play_processed());
        assert_eq!(s.playing_route(), Some(Route::Processed));

        assert!(s.play_raw());
        assert_eq!(s.playback_state(), PlaybackState::Playing);
        assert_eq!(s.playing_route(), Some(Route::Raw));
        let mut out = vec![0.0; 512];
        s.process(&mut out);
        assert!(s.analyser().byte_time_domain().iter().any(|&b| b != 128));

        // Processed play takes over again
        assert!(s.play_processed());
        assert_eq!(s.playing_route(), Some(Route::Processed));
    }

    #[test]
    fn raw_play_ignores_effects() {
        let mut s = session();
        s.load_recording(recording(4000));
        s.set_param(Param::Gain, 0.0).unwrap();
        s.play_raw();
        let mut out = vec![0.0; 512];
        s.process(&mut out);
        assert!(out.iter().any(|v| v.abs() > 0.1));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut s = session();
        s.stop_processed();
        s.load_recording(recording(4000));
        s.play_processed();
        s.stop_processed();
        s.stop_processed();
        assert_eq!(s.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn param_changes_reach_preview() {
        let mut s = session();
        s.load_recording(recording(8000));
        s.play_processed();
        s.set_param(Param::Gain, 0.0).unwrap();
        let mut out = vec![0.0; 1024];
        s.process(&mut out);
        s.process(&mut out);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn preview_runs_to_end() {
        let mut s = session();
        s.load_recording(recording(500));
        s.play_processed();
        let mut out = vec![0.0; 256];
        let mut ended = false;
        for _ in 0..10 {
            if s.process(&mut out) == Some(PlaybackEvent::Ended) {
                ended = true;
                break;
            }
        }
        assert!(ended);
        assert_eq!(s.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn export_without_recording_fails() {
        let s = session();
        let mut sink = MemorySink::default();
        assert!(matches!(s.export(ExportKind::Raw, &mut sink), Err(ExportError::NoRecording)));
        assert!(sink.files.is_empty());
    }

    #[test]
    fn export_uses_current_params() {
        let mut s = session();
        s.load_recording(recording(4000));
        s.set_param(Param::Gain, 0.0).unwrap();
        let bytes = s.export_bytes(ExportKind::WithEffects).unwrap();
        assert_eq!(bytes.len(), 44 + 4000 * 2);
        assert!(bytes[44..].iter().all(|b| *b == 0));

        let mut sink = MemorySink::default();
        assert_eq!(s.export(ExportKind::Raw, &mut sink).unwrap(), "Recording.wav");
        assert_eq!(sink.files.len(), 1);
    }

    #[cfg(feature = "decode")]
    #[test]
    fn load_recording_bytes_decodes_wav() {
        let mut s = session();
        let wav = crate::wav::encode(&recording(1000)).unwrap();
        s.load_recording_bytes(&wav).unwrap();
        assert_eq!(s.recording().unwrap().frames(), 1000);
        assert!(s.load_recording_bytes(b"garbage").is_err());
        // The previous recording survives a failed decode
        assert_eq!(s.recording().unwrap().frames(), 1000);
    }
}
