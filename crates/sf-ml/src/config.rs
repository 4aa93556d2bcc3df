//! Separation configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};
use crate::separation::ModelKind;

/// Upper bound on shift passes accepted from callers
pub const MAX_SHIFTS: usize = 10;

/// Separation quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeparationQuality {
    /// No overlap, no shifts
    Fast,
    /// Balanced
    #[default]
    Default,
    /// More overlap and shifts
    High,
    /// Slowest, best
    Ultra,
}

/// Separation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Quality preset the values were derived from
    pub quality: SeparationQuality,

    /// Overlap between consecutive segments, as a fraction of segment length [0, 1)
    pub overlap: f32,

    /// Shift passes for requests that leave the count unset
    pub shifts: usize,

    /// Largest shift count accepted by the orchestrator
    pub max_shifts: usize,

    /// Maximum concurrent model invocations
    pub max_in_flight: usize,

    /// Exponent applied to the triangular blend window
    pub transition_power: f32,

    /// Seed for shift offsets (None = fresh randomness per request)
    pub seed: Option<u64>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            quality: SeparationQuality::Default,
            overlap: 0.25,
            shifts: 1,
            max_shifts: MAX_SHIFTS,
            max_in_flight: 1,
            transition_power: 1.0,
            seed: None,
        }
    }
}

impl SeparationConfig {
    /// Create fast configuration
    pub fn fast() -> Self {
        Self {
            quality: SeparationQuality::Fast,
            overlap: 0.0,
            shifts: 0,
            ..Default::default()
        }
    }

    /// Create high quality configuration
    pub fn high_quality() -> Self {
        Self {
            quality: SeparationQuality::High,
            overlap: 0.25,
            shifts: 2,
            ..Default::default()
        }
    }

    /// Create ultra quality configuration
    pub fn ultra() -> Self {
        Self {
            quality: SeparationQuality::Ultra,
            overlap: 0.5,
            shifts: 5,
            ..Default::default()
        }
    }

    /// Preset configuration for `quality`
    pub fn for_quality(quality: SeparationQuality) -> Self {
        match quality {
            SeparationQuality::Fast => Self::fast(),
            SeparationQuality::Default => Self::default(),
            SeparationQuality::High => Self::high_quality(),
            SeparationQuality::Ultra => Self::ultra(),
        }
    }

    /// Set concurrent model invocations
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Fix the shift offset seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> MlResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> MlResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validate configuration values
    pub fn validate(&self) -> MlResult<()> {
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(MlError::InvalidConfiguration(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        if self.max_in_flight == 0 {
            return Err(MlError::InvalidConfiguration(
                "max_in_flight must be at least 1".into(),
            ));
        }
        if self.shifts > self.max_shifts {
            return Err(MlError::InvalidConfiguration(format!(
                "shifts {} exceeds max_shifts {}",
                self.shifts, self.max_shifts
            )));
        }
        if !(self.transition_power.is_finite() && self.transition_power > 0.0) {
            return Err(MlError::InvalidConfiguration(format!(
                "transition_power must be positive, got {}",
                self.transition_power
            )));
        }
        Ok(())
    }
}

/// Where models come from and which to load at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding `<model>.onnx` files
    pub models_dir: PathBuf,

    /// Models loaded eagerly by `ModelRegistry::preload`
    pub preload: Vec<ModelKind>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            preload: ModelKind::all().to_vec(),
        }
    }
}

impl RegistryConfig {
    /// Parse from JSON
    pub fn from_json(json: &str) -> MlResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_presets() {
        let fast = SeparationConfig::fast();
        let ultra = SeparationConfig::ultra();

        assert!(fast.validate().is_ok());
        assert!(ultra.validate().is_ok());
        assert!(fast.shifts < ultra.shifts);
        assert!(fast.overlap < ultra.overlap);
        assert_eq!(SeparationConfig::default().overlap, 0.25);
    }

    #[test]
    fn test_for_quality_matches_presets() {
        for quality in [
            SeparationQuality::Fast,
            SeparationQuality::Default,
            SeparationQuality::High,
            SeparationQuality::Ultra,
        ] {
            let config = SeparationConfig::for_quality(quality);
            assert_eq!(config.quality, quality);
            assert!(config.validate().is_ok());
        }
        assert_eq!(
            SeparationConfig::for_quality(SeparationQuality::High),
            SeparationConfig::high_quality()
        );
        assert_eq!(SeparationConfig::for_quality(SeparationQuality::Fast).shifts, 0);
        assert_eq!(SeparationConfig::for_quality(SeparationQuality::Ultra).shifts, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SeparationConfig::default();
        config.overlap = 1.0;
        assert!(matches!(config.validate(), Err(MlError::InvalidConfiguration(_))));

        let config = SeparationConfig::default().with_max_in_flight(0);
        assert!(config.validate().is_err());

        let mut config = SeparationConfig::default();
        config.shifts = MAX_SHIFTS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SeparationConfig::from_json(r#"{ "shifts": 3, "seed": 7 }"#).unwrap();
        assert_eq!(config.shifts, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.overlap, 0.25);

        assert!(SeparationConfig::from_json(r#"{ "overlap": -0.1 }"#).is_err());
    }

    #[test]
    fn test_registry_config_json() {
        let config =
            RegistryConfig::from_json(r#"{ "models_dir": "/opt/models", "preload": ["htdemucs_6s"] }"#)
                .unwrap();
        assert_eq!(config.models_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.preload, vec![ModelKind::Htdemucs6s]);
    }
}
