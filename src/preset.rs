//! Named parameter snapshots.
//!
//! Four presets ship with the recorder. Additional ones can be loaded from a
//! JSON map of `name -> { label, params }`, the same shape the page uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;
use crate::params::ParameterSet;

/// An immutable, named [`ParameterSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Lookup key (e.g. "hall").
    #[serde(default)]
    pub name: String,
    /// Button caption (e.g. "Hall").
    pub label: String,
    pub params: ParameterSet,
}

impl Preset {
    fn builtin(name: &str, label: &str, params: ParameterSet) -> Self {
        Preset { name: name.to_string(), label: label.to_string(), params }
    }
}

/// The built-in presets, in button order.
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::builtin(
            "clean",
            "Clean",
            ParameterSet {
                gain: 1.0,
                lowpass_hz: 20000.0,
                highpass_hz: 10.0,
                delay_time_sec: 0.0,
                reverb_mix: 0.1,
                pitch: 1.0,
            },
        ),
        Preset::builtin(
            "phone",
            "Phone",
            ParameterSet {
                gain: 1.0,
                lowpass_hz: 3500.0,
                highpass_hz: 400.0,
                delay_time_sec: 0.0,
                reverb_mix: 0.0,
                pitch: 1.0,
            },
        ),
        Preset::builtin(
            "hall",
            "Hall",
            ParameterSet {
                gain: 1.0,
                lowpass_hz: 18000.0,
                highpass_hz: 80.0,
                delay_time_sec: 0.25,
                reverb_mix: 0.7,
                pitch: 1.0,
            },
        ),
        Preset::builtin(
            "lofi",
            "Lo-Fi",
            ParameterSet {
                gain: 0.9,
                lowpass_hz: 5000.0,
                highpass_hz: 150.0,
                delay_time_sec: 0.12,
                reverb_mix: 0.4,
                pitch: 0.9,
            },
        ),
    ]
}

/// Ordered collection of presets available to a session.
#[derive(Debug, Clone)]
pub struct PresetBank {
    presets: Vec<Preset>,
}

impl Default for PresetBank {
    fn default() -> Self {
        PresetBank { presets: builtin_presets() }
    }
}

impl PresetBank {
    pub fn get(&self, name: &str) -> Result<&Preset, ParamError> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ParamError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    /// Add a preset, replacing any existing one with the same name.
    pub fn insert(&mut self, preset: Preset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    /// Merge presets from a JSON object keyed by preset name.
    pub fn load_json(&mut self, json: &str) -> Result<usize, ParamError> {
        let map: BTreeMap<String, Preset> = serde_json::from_str(json)?;
        let count = map.len();
        for (name, mut preset) in map {
            preset.name = name;
            preset.params = preset.params.clamped();
            self.insert(preset);
        }
        log::debug!("loaded {count} presets from JSON");
        Ok(count)
    }
}
