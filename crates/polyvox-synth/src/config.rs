//! Engine configuration.
//!
//! [`EngineConfig`] decides how many modules of each kind exist, the
//! smoothing ramp, playback defaults and tuning. It is read from TOML:
//!
//! ```toml
//! voices = 8
//! oscillators = 3
//! lfos = 4
//! envelopes = 4
//! effects = 2
//! macros = 8
//! smoothing_ms = 6.0
//! sample_rate = 48000.0
//! block_size = 256
//!
//! [tuning]
//! reference_note = 60
//! cents = [0.0, -29.3, 3.9, 15.6, -13.7, -2.0, -31.3, 2.0, -27.4, -15.6, 17.6, -11.7]
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::component::MAX_VOICES;
use crate::error::ConfigError;

/// Upper bound for oscillator modules.
pub const MAX_OSCILLATORS: usize = 3;
/// Upper bound for LFO modules.
pub const MAX_LFOS: usize = 8;
/// Upper bound for envelope modules.
pub const MAX_ENVELOPES: usize = 8;
/// Upper bound for effect modules.
pub const MAX_EFFECTS: usize = 4;
/// Upper bound for macro sources.
pub const MAX_MACROS: usize = 8;

/// Scale table used by [`Tuning`](crate::Tuning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Note that anchors scale degree 0.
    pub reference_note: u8,
    /// Per-degree offsets in cents from 12-TET. `None` is equal temperament.
    pub cents: Option<Vec<f32>>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self { reference_note: 60, cents: None }
    }
}

/// Engine layout and playback defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Active voice count at start-up.
    pub voices: usize,
    /// Oscillator modules (`Osc1..`).
    pub oscillators: usize,
    /// LFO modules (`LFO1..`).
    pub lfos: usize,
    /// Envelope modules (`Envelope1..`). `Envelope1` drives amplitude.
    pub envelopes: usize,
    /// Effect modules (`Effect1..`).
    pub effects: usize,
    /// Macro sources (`M1..`).
    pub macros: usize,
    /// Parameter smoothing ramp in milliseconds.
    pub smoothing_ms: f32,
    /// Sample rate used until `prepare_to_play` is called.
    pub sample_rate: f32,
    /// Block size used until `prepare_to_play` is called.
    pub block_size: usize,
    /// Tuning table.
    pub tuning: TuningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 8,
            oscillators: 3,
            lfos: 4,
            envelopes: 4,
            effects: 2,
            macros: 8,
            smoothing_ms: 6.0,
            sample_rate: 48000.0,
            block_size: 256,
            tuning: TuningConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), voices = config.voices, "engine config loaded");
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("voices", self.voices, 1, MAX_VOICES)?;
        check_count("oscillators", self.oscillators, 1, MAX_OSCILLATORS)?;
        check_count("lfos", self.lfos, 0, MAX_LFOS)?;
        check_count("envelopes", self.envelopes, 1, MAX_ENVELOPES)?;
        check_count("effects", self.effects, 0, MAX_EFFECTS)?;
        check_count("macros", self.macros, 0, MAX_MACROS)?;
        check_count("block_size", self.block_size, 1, 8192)?;

        if !(self.smoothing_ms.is_finite() && (0.0..=1000.0).contains(&self.smoothing_ms)) {
            return Err(ConfigError::invalid(format!(
                "smoothing_ms must be within 0..=1000, got {}",
                self.smoothing_ms
            )));
        }
        if !(self.sample_rate.is_finite() && (8000.0..=384_000.0).contains(&self.sample_rate)) {
            return Err(ConfigError::invalid(format!(
                "sample_rate must be within 8000..=384000, got {}",
                self.sample_rate
            )));
        }
        if self.tuning.reference_note > 127 {
            return Err(ConfigError::invalid(format!(
                "tuning.reference_note must be 0..=127, got {}",
                self.tuning.reference_note
            )));
        }
        if let Some(cents) = &self.tuning.cents {
            if cents.len() != 12 {
                return Err(ConfigError::invalid(format!(
                    "tuning.cents needs 12 entries, got {}",
                    cents.len()
                )));
            }
            if cents.iter().any(|c| !c.is_finite()) {
                return Err(ConfigError::invalid("tuning.cents must be finite"));
            }
        }
        Ok(())
    }
}

fn check_count(field: &str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(format!(
            "{field} must be within {min}..={max}, got {value}"
        )))
    }
}
