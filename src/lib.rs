pub mod config;
#[cfg(feature = "decode")]
pub mod decode;
pub mod dsp;
pub mod error;
pub mod export;
pub mod params;
pub mod preset;
pub mod session;
pub mod wav;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dsp::buffer::SampleBuffer;
use crate::dsp::live::{PlaybackEvent, PlaybackState};
use crate::dsp::renderer::OfflineRenderer;
use crate::error::RenderError;
use crate::params::ParameterSet;
use crate::preset::PresetBank;
use crate::session::Session;
use crate::wav::RenderedWav;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render a recording through the effect chain with the default engine
/// configuration. Out-of-range values are clamped; NaN or infinite values
/// are rejected.
pub fn render_effects(buffer: SampleBuffer, params: &ParameterSet) -> Result<RenderedWav, RenderError> {
    OfflineRenderer::default().render(&Arc::new(buffer), params)
}

/// Names of the built-in presets, in button order.
pub fn builtin_preset_names() -> Vec<String> {
    PresetBank::default().names().map(str::to_string).collect()
}

/// WASM-exposed: return the voicefx-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: render interleaved samples with `params` (a parameter
/// object using the page's keys) and return a mono 16-bit WAV file.
#[wasm_bindgen]
pub fn render_effects_wav(
    samples: &[f32],
    channel_count: usize,
    sample_rate: u32,
    params: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let params: ParameterSet =
        serde_wasm_bindgen::from_value(params).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let buffer = SampleBuffer::from_interleaved(samples, channel_count, sample_rate);
    let rendered = render_effects(buffer, &params).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    rendered.to_bytes().map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: encode interleaved samples as a 16-bit WAV file.
#[wasm_bindgen]
pub fn encode_wav(samples: &[f32], channel_count: usize, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    wav::encode(&SampleBuffer::from_interleaved(samples, channel_count, sample_rate))
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: the parameter values of a built-in preset.
#[wasm_bindgen]
pub fn preset_params(name: &str) -> Result<JsValue, JsValue> {
    let bank = PresetBank::default();
    let preset = bank.get(name).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&preset.params).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: names of the built-in presets, in button order.
#[wasm_bindgen]
pub fn preset_names() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&builtin_preset_names()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed recorder session for the AudioWorklet host.
///
/// The worklet calls `process` for every output buffer; the page forwards
/// knob changes with `set_param` and draws `waveform_bytes` each frame.
#[wasm_bindgen]
pub struct LiveSession {
    inner: Session,
}

#[wasm_bindgen]
impl LiveSession {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64) -> Result<LiveSession, JsValue> {
        let inner = Session::new(sample_rate, EngineConfig::default()).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(LiveSession { inner })
    }

    /// Create a session with an engine configuration given as JSON.
    pub fn with_config(sample_rate: f64, config_json: &str) -> Result<LiveSession, JsValue> {
        let config = EngineConfig::from_json(config_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        let inner = Session::new(sample_rate, config).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(LiveSession { inner })
    }

    /// Replace the recording with decoded, interleaved samples.
    pub fn load_recording(&mut self, samples: &[f32], channel_count: usize, sample_rate: u32) {
        self.inner
            .load_recording(SampleBuffer::from_interleaved(samples, channel_count, sample_rate));
    }

    pub fn has_recording(&self) -> bool {
        self.inner.has_recording()
    }

    /// Set a parameter by its key (`gain`, `pitch`, `lowpass`, `highpass`,
    /// `delayTime`, `reverbMix`). Returns the clamped value.
    pub fn set_param(&mut self, key: &str, value: f64) -> Result<f64, JsValue> {
        let update = self
            .inner
            .set_param_by_key(key, value)
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(update.value)
    }

    /// Apply a preset by name and return the resulting parameter object.
    pub fn apply_preset(&mut self, name: &str) -> Result<JsValue, JsValue> {
        let params = self
            .inner
            .apply_preset(name)
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        serde_wasm_bindgen::to_value(&params).map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    /// Start the processed preview. Returns `false` without a recording.
    pub fn play(&mut self) -> bool {
        self.inner.play_processed()
    }

    /// Play the recording without effects, stopping the processed preview.
    /// Returns `false` without a recording.
    pub fn play_raw(&mut self) -> bool {
        self.inner.play_raw()
    }

    pub fn stop(&mut self) {
        self.inner.stop_processed();
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playback_state() == PlaybackState::Playing
    }

    /// Fill an interleaved output buffer. Returns `true` when the preview
    /// ended during this call.
    pub fn process(&mut self, out: &mut [f32]) -> bool {
        self.inner.process(out) == Some(PlaybackEvent::Ended)
    }

    /// Latest analyser window as unsigned bytes (128 = silence).
    pub fn waveform_bytes(&self) -> Vec<u8> {
        self.inner.analyser().byte_time_domain()
    }

    /// Current parameter values.
    pub fn params(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.params()).map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    /// WAV bytes of the recording as captured.
    pub fn export_raw(&self) -> Result<Vec<u8>, JsValue> {
        self.inner
            .export_bytes(export::ExportKind::Raw)
            .map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    /// WAV bytes of the recording rendered with the current values.
    pub fn export_with_effects(&self) -> Result<Vec<u8>, JsValue> {
        self.inner
            .export_bytes(export::ExportKind::WithEffects)
            .map_err(|e| JsValue::from_str(&format!("{e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn encode_wav_from_interleaved() {
        let wav = encode_wav(&[0.5, -0.5, 0.25, -0.25], 2, 8000).unwrap();
        let header = wav::WavHeader::parse(&wav).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.frames(), 2);
    }

    #[test]
    fn render_effects_keeps_length() {
        let buffer = SampleBuffer::mono(vec![0.1; 4410], 44100);
        let out = render_effects(buffer, &ParameterSet::default()).unwrap();
        assert_eq!(out.buffer().frames(), 4410);
    }

    #[test]
    fn render_effects_rejects_nan() {
        let buffer = SampleBuffer::mono(vec![0.1; 1000], 8000);
        let params = ParameterSet { delay_time_sec: f64::NAN, ..ParameterSet::default() };
        assert!(matches!(render_effects(buffer, &params), Err(RenderError::Params(_))));
    }

    #[test]
    fn builtin_presets_are_listed() {
        assert_eq!(builtin_preset_names(), ["clean", "phone", "hall", "lofi"]);
    }

    #[test]
    fn live_session_plays_and_exports() {
        let mut session = LiveSession::new(8000.0).unwrap();
        assert!(!session.play());
        session.load_recording(&[0.25; 2000], 1, 8000);
        assert!(session.play());
        assert!(session.is_playing());
        let mut out = vec![0.0; 512];
        session.process(&mut out);
        assert_eq!(session.waveform_bytes().len(), 2048);
        assert!(session.play_raw());
        assert!(session.is_playing());
        session.stop();
        assert!(!session.is_playing());

        let raw = session.export_raw().unwrap();
        assert_eq!(wav::WavHeader::parse(&raw).unwrap().frames(), 2000);
    }
}
