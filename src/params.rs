//! Effect parameters: the six knobs, their ranges, and the live store.

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Rotation limits of a knob, in degrees.
pub const KNOB_MIN_ANGLE: f64 = -135.0;
pub const KNOB_MAX_ANGLE: f64 = 135.0;

/// One of the six effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Param {
    Gain,
    Pitch,
    Lowpass,
    Highpass,
    DelayTime,
    ReverbMix,
}

/// Range and display metadata for a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    pub label: &'static str,
}

impl Param {
    pub const ALL: [Param; 6] = [
        Param::Gain,
        Param::Pitch,
        Param::Lowpass,
        Param::Highpass,
        Param::DelayTime,
        Param::ReverbMix,
    ];

    pub fn spec(self) -> ParamSpec {
        match self {
            Param::Gain => ParamSpec { min: 0.0, max: 4.0, step: 0.01, default: 1.0, label: "Volume" },
            Param::Pitch => ParamSpec { min: 0.5, max: 2.0, step: 0.01, default: 1.0, label: "Pitch" },
            Param::Lowpass => ParamSpec { min: 10.0, max: 20000.0, step: 1.0, default: 20000.0, label: "Lowpass" },
            Param::Highpass => ParamSpec { min: 10.0, max: 5000.0, step: 1.0, default: 10.0, label: "Highpass" },
            Param::DelayTime => ParamSpec { min: 0.0, max: 1.0, step: 0.01, default: 0.0, label: "Delay" },
            Param::ReverbMix => ParamSpec { min: 0.0, max: 1.0, step: 0.01, default: 0.3, label: "Reverb" },
        }
    }

    /// The key used by the page and in serialized parameter sets.
    pub fn key(self) -> &'static str {
        match self {
            Param::Gain => "gain",
            Param::Pitch => "pitch",
            Param::Lowpass => "lowpass",
            Param::Highpass => "highpass",
            Param::DelayTime => "delayTime",
            Param::ReverbMix => "reverbMix",
        }
    }

    pub fn from_key(key: &str) -> Result<Param, ParamError> {
        Param::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| ParamError::UnknownParam(key.to_string()))
    }

    /// Clamp a value into this parameter's range.
    pub fn clamp(self, value: f64) -> f64 {
        let spec = self.spec();
        value.clamp(spec.min, spec.max)
    }

    /// Knob rotation for a value: min maps to -135°, max to +135°.
    pub fn angle_for_value(self, value: f64) -> f64 {
        let spec = self.spec();
        KNOB_MIN_ANGLE + (value - spec.min) / (spec.max - spec.min) * (KNOB_MAX_ANGLE - KNOB_MIN_ANGLE)
    }

    /// Value for a knob rotation, quantized to the parameter's step.
    pub fn value_for_angle(self, angle: f64) -> f64 {
        let spec = self.spec();
        let angle = angle.clamp(KNOB_MIN_ANGLE, KNOB_MAX_ANGLE);
        let t = (angle - KNOB_MIN_ANGLE) / (KNOB_MAX_ANGLE - KNOB_MIN_ANGLE);
        let raw = spec.min + (spec.max - spec.min) * t;
        ((raw / spec.step).round() * spec.step).clamp(spec.min, spec.max)
    }
}

/// A full set of effect parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    /// Master gain (linear).
    pub gain: f64,
    /// Source playback rate; changes both pitch and duration.
    pub pitch: f64,
    /// Lowpass cutoff in Hz.
    #[serde(rename = "lowpass")]
    pub lowpass_hz: f64,
    /// Highpass cutoff in Hz.
    #[serde(rename = "highpass")]
    pub highpass_hz: f64,
    /// Delay time in seconds.
    #[serde(rename = "delayTime")]
    pub delay_time_sec: f64,
    /// Dry/wet balance of the reverb (0 = dry, 1 = wet).
    pub reverb_mix: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        ParameterSet {
            gain: Param::Gain.spec().default,
            pitch: Param::Pitch.spec().default,
            lowpass_hz: Param::Lowpass.spec().default,
            highpass_hz: Param::Highpass.spec().default,
            delay_time_sec: Param::DelayTime.spec().default,
            reverb_mix: Param::ReverbMix.spec().default,
        }
    }
}

impl ParameterSet {
    pub fn get(&self, param: Param) -> f64 {
        match param {
            Param::Gain => self.gain,
            Param::Pitch => self.pitch,
            Param::Lowpass => self.lowpass_hz,
            Param::Highpass => self.highpass_hz,
            Param::DelayTime => self.delay_time_sec,
            Param::ReverbMix => self.reverb_mix,
        }
    }

    pub(crate) fn slot(&mut self, param: Param) -> &mut f64 {
        match param {
            Param::Gain => &mut self.gain,
            Param::Pitch => &mut self.pitch,
            Param::Lowpass => &mut self.lowpass_hz,
            Param::Highpass => &mut self.highpass_hz,
            Param::DelayTime => &mut self.delay_time_sec,
            Param::ReverbMix => &mut self.reverb_mix,
        }
    }

    /// Dry path gain; always `1 - wet_gain()`.
    pub fn dry_gain(&self) -> f64 {
        1.0 - self.reverb_mix
    }

    /// Wet (convolved) path gain.
    pub fn wet_gain(&self) -> f64 {
        self.reverb_mix
    }

    /// One update per parameter, carrying this set's values.
    pub fn updates(&self) -> impl Iterator<Item = ParamUpdate> + '_ {
        Param::ALL
            .into_iter()
            .map(|param| ParamUpdate { param, value: self.get(param) })
    }

    /// Copy with every value clamped into its range.
    pub fn clamped(mut self) -> Self {
        for param in Param::ALL {
            let slot = self.slot(param);
            *slot = param.clamp(*slot);
        }
        self
    }

    /// Clamped copy, or the first parameter holding NaN or an infinity.
    pub fn checked(self) -> Result<Self, ParamError> {
        if let Some(param) = Param::ALL.into_iter().find(|&p| !self.get(p).is_finite()) {
            return Err(ParamError::NotFinite { param, value: self.get(param) });
        }
        Ok(self.clamped())
    }
}

/// A value change to push into a built chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    pub param: Param,
    pub value: f64,
}

/// The session's current parameter values.
///
/// Every mutation returns the [`ParamUpdate`]s that were applied so the
/// caller can forward them to whichever chain is live.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: ParameterSet,
}

impl ParameterStore {
    pub fn new(values: ParameterSet) -> Self {
        ParameterStore { values: values.clamped() }
    }

    pub fn get(&self, param: Param) -> f64 {
        self.values.get(param)
    }

    /// Snapshot of all values, e.g. for an offline render.
    pub fn snapshot(&self) -> ParameterSet {
        self.values
    }

    /// Set one parameter. The value is clamped into range; non-finite values
    /// are rejected and leave the store untouched.
    pub fn set(&mut self, param: Param, value: f64) -> Result<ParamUpdate, ParamError> {
        if !value.is_finite() {
            return Err(ParamError::NotFinite { param, value });
        }
        let value = param.clamp(value);
        *self.values.slot(param) = value;
        log::trace!("param {} = {value}", param.key());
        Ok(ParamUpdate { param, value })
    }

    /// Overwrite every parameter at once.
    pub fn replace(&mut self, values: ParameterSet) -> Vec<ParamUpdate> {
        self.values = values.clamped();
        self.values.updates().collect()
    }
}
