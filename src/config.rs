//! Engine configuration.
//!
//! Everything here has a default matching the browser page; hosts may load
//! overrides from JSON (camelCase keys, missing keys fall back to defaults).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Frames per processing block, the browser's render quantum.
pub const RENDER_QUANTUM: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Frames processed per block. Also the shortest delay a feedback loop
    /// can have.
    pub render_quantum: usize,
    /// Length of the synthetic reverb impulse, in seconds.
    pub impulse_duration: f64,
    /// Exponent of the impulse decay envelope.
    pub impulse_decay: f64,
    pub impulse_channels: usize,
    /// Gain of the delay feedback loop.
    pub feedback_gain: f64,
    /// Longest supported delay time, in seconds.
    pub max_delay: f64,
    /// Analyser window size (power of two).
    pub analyser_fft_size: usize,
    /// Channels delivered to the live output device.
    pub live_channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            render_quantum: RENDER_QUANTUM,
            impulse_duration: 2.5,
            impulse_decay: 2.0,
            impulse_channels: 2,
            feedback_gain: 0.3,
            max_delay: 5.0,
            analyser_fft_size: 2048,
            live_channels: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_quantum == 0 {
            return Err(ConfigError::Invalid("renderQuantum must be positive".into()));
        }
        if !(self.impulse_duration.is_finite() && self.impulse_duration >= 0.0) {
            return Err(ConfigError::Invalid("impulseDuration must be >= 0".into()));
        }
        if !(self.impulse_decay.is_finite() && self.impulse_decay >= 0.0) {
            return Err(ConfigError::Invalid("impulseDecay must be >= 0".into()));
        }
        if self.impulse_channels == 0 {
            return Err(ConfigError::Invalid("impulseChannels must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.feedback_gain.abs()) {
            return Err(ConfigError::Invalid("feedbackGain must be in (-1, 1)".into()));
        }
        if !(self.max_delay.is_finite() && self.max_delay > 0.0) {
            return Err(ConfigError::Invalid("maxDelay must be positive".into()));
        }
        if !self.analyser_fft_size.is_power_of_two() || !(32..=32768).contains(&self.analyser_fft_size) {
            return Err(ConfigError::Invalid(
                "analyserFftSize must be a power of two in 32..=32768".into(),
            ));
        }
        if self.live_channels == 0 {
            return Err(ConfigError::Invalid("liveChannels must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.feedback_gain, 0.3);
        assert_eq!(config.impulse_duration, 2.5);
        assert_eq!(config.render_quantum, 128);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "impulseDuration": 0.5, "feedbackGain": 0.45 }"#).unwrap();
        assert_eq!(config.impulse_duration, 0.5);
        assert_eq!(config.feedback_gain, 0.45);
        assert_eq!(config.impulse_decay, 2.0);
        assert_eq!(config.analyser_fft_size, 2048);
    }

    #[test]
    fn rejects_runaway_feedback() {
        let err = EngineConfig::from_json(r#"{ "feedbackGain": 1.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_fft_size() {
        assert!(EngineConfig::from_json(r#"{ "analyserFftSize": 1000 }"#).is_err());
        assert!(EngineConfig::from_json(r#"{ "analyserFftSize": 16 }"#).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(EngineConfig::from_json("[1,2"), Err(ConfigError::Json(_))));
    }
}
