//! Extraction configuration
//!
//! All thresholds that steer sampling, blur rejection, deduplication and the
//! fallback pass live in one serde-friendly struct so they can be loaded from
//! a JSON file and overridden from the command line.

use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use crate::common::{KeyframeError, Result};

/// How the two replacement conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacePolicy {
    /// Sharper by the factor, or carrying enough extra text
    #[default]
    Either,
    /// Sharper by the factor and carrying enough extra text
    Both,
}

/// Tunables for one extraction pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Seconds between consecutive samples
    pub capture_interval_seconds: f64,
    /// Histogram correlation at or above which two frames show the same slide
    pub similarity_threshold: f64,
    /// Candidate must be sharper than incumbent * factor to replace it
    pub replace_sharpness_factor: f64,
    /// Candidate must carry this many more text units to replace the incumbent
    pub replace_text_extra: u32,
    /// Laplacian variance below which a frame counts as blurry
    pub min_sharpness: f64,
    pub replace_policy: ReplacePolicy,
    /// Content-aware passes yielding fewer records trigger the fallback pass
    pub min_keyframes: usize,
    /// Upper bound on uniformly sampled fallback positions
    pub max_fallback_frames: u32,
    /// One fallback position per this many source frames
    pub frames_per_fallback_sample: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            capture_interval_seconds: 5.0,
            similarity_threshold: 0.90,
            replace_sharpness_factor: 1.10,
            replace_text_extra: 10,
            min_sharpness: 50.0,
            replace_policy: ReplacePolicy::Either,
            min_keyframes: 3,
            max_fallback_frames: 20,
            frames_per_fallback_sample: 100,
        }
    }
}

impl ExtractionConfig {
    /// Load a configuration from a JSON file; missing keys keep their defaults
    #[instrument]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            KeyframeError::config_error(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;

        debug!("Loaded extraction config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Validate that the settings describe a runnable pass
    pub fn validate(&self) -> Result<()> {
        if !(self.capture_interval_seconds > 0.0) {
            return Err(KeyframeError::config_error(format!(
                "capture interval must be positive, got {}",
                self.capture_interval_seconds
            )));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(KeyframeError::config_error(format!(
                "similarity threshold must lie in [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(self.replace_sharpness_factor >= 1.0) {
            return Err(KeyframeError::config_error(format!(
                "replace sharpness factor must be at least 1.0, got {}",
                self.replace_sharpness_factor
            )));
        }
        if !(self.min_sharpness >= 0.0) {
            return Err(KeyframeError::config_error(format!(
                "minimum sharpness must be non-negative, got {}",
                self.min_sharpness
            )));
        }
        if self.max_fallback_frames == 0 || self.frames_per_fallback_sample == 0 {
            return Err(KeyframeError::config_error(
                "fallback limits must be positive"
            ));
        }
        Ok(())
    }

    /// Source frames between two content-aware samples, never less than one
    pub fn interval_frames(&self, fps: f64) -> u32 {
        (self.capture_interval_seconds * fps).round().max(1.0) as u32
    }

    /// Number of uniformly spaced positions the fallback pass visits
    pub fn fallback_count(&self, total_frame_count: u32) -> u32 {
        (total_frame_count / self.frames_per_fallback_sample)
            .max(1)
            .min(self.max_fallback_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.capture_interval_seconds, 5.0);
        assert_eq!(config.similarity_threshold, 0.90);
        assert_eq!(config.replace_sharpness_factor, 1.10);
        assert_eq!(config.replace_text_extra, 10);
        assert_eq!(config.min_sharpness, 50.0);
        assert_eq!(config.replace_policy, ReplacePolicy::Either);
        assert_eq!(config.min_keyframes, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_frames() {
        let config = ExtractionConfig::default();
        assert_eq!(config.interval_frames(25.0), 125);
        assert_eq!(config.interval_frames(29.97), 150);

        let tiny = ExtractionConfig { capture_interval_seconds: 0.001, ..Default::default() };
        assert_eq!(tiny.interval_frames(25.0), 1);
    }

    #[test]
    fn test_fallback_count() {
        let config = ExtractionConfig::default();
        assert_eq!(config.fallback_count(0), 1);
        assert_eq!(config.fallback_count(99), 1);
        assert_eq!(config.fallback_count(750), 7);
        assert_eq!(config.fallback_count(2500), 20);
        assert_eq!(config.fallback_count(1_000_000), 20);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            ExtractionConfig { capture_interval_seconds: 0.0, ..Default::default() },
            ExtractionConfig { capture_interval_seconds: f64::NAN, ..Default::default() },
            ExtractionConfig { similarity_threshold: 1.5, ..Default::default() },
            ExtractionConfig { replace_sharpness_factor: 0.9, ..Default::default() },
            ExtractionConfig { min_sharpness: -1.0, ..Default::default() },
            ExtractionConfig { max_fallback_frames: 0, ..Default::default() },
            ExtractionConfig { frames_per_fallback_sample: 0, ..Default::default() },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, KeyframeError::InvalidConfig { .. }), "{:?}", config);
        }
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"capture_interval_seconds": 2.5, "replace_policy": "both"}}"#).unwrap();

        let config = ExtractionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.capture_interval_seconds, 2.5);
        assert_eq!(config.replace_policy, ReplacePolicy::Both);
        assert_eq!(config.similarity_threshold, 0.90);
    }

    #[test]
    fn test_from_json_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"similarity_threshold": 3.0}}"#).unwrap();
        assert!(ExtractionConfig::from_json_file(file.path()).is_err());

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        let err = ExtractionConfig::from_json_file(garbage.path()).unwrap_err();
        assert!(matches!(err, KeyframeError::InvalidConfig { .. }));
    }
}
