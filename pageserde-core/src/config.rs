// In: src/config.rs

//! The single source of truth for page serde configuration.
//!
//! `PagesSerdeConfig` is created once at engine-configuration time (in code, or
//! parsed from the engine's JSON configuration) and handed to the
//! `PagesSerdeFactory`. Per-call choices, the spill cipher and the direct-serde
//! switch, are not configuration: the caller supplies them when it asks the
//! factory for a strategy.

use serde::{Deserialize, Serialize};

use crate::error::PagesSerdeError;

//==================================================================================
// I. The Unified PagesSerdeConfig
//==================================================================================

/// Engine-level settings for the page serde layer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PagesSerdeConfig {
    /// If true, buffered strategies built by the factory compress page payloads.
    #[serde(default)]
    pub compression_enabled: bool,

    /// The zstd level used by the default compressor.
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// When set, a compressed payload is only kept if
    /// `compressed_len / logical_len <= ratio`. Otherwise the raw bytes are
    /// stored and the header records that the page is not compressed.
    /// When unset, every page is stored compressed.
    #[serde(default)]
    pub min_compression_ratio: Option<f64>,
}

impl Default for PagesSerdeConfig {
    fn default() -> Self {
        Self {
            compression_enabled: false,
            compression_level: default_compression_level(),
            min_compression_ratio: None,
        }
    }
}

impl PagesSerdeConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, PagesSerdeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every field lies in the range the strategies accept.
    pub fn validate(&self) -> Result<(), PagesSerdeError> {
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(PagesSerdeError::InvalidConfig(format!(
                "compression_level {} is outside the supported range {}..={}",
                self.compression_level,
                levels.start(),
                levels.end()
            )));
        }

        if let Some(ratio) = self.min_compression_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PagesSerdeError::InvalidConfig(format!(
                    "min_compression_ratio must be in (0, 1], got {}",
                    ratio
                )));
            }
        }

        Ok(())
    }
}

/// Helper for `serde` to provide the default zstd level.
fn default_compression_level() -> i32 {
    3
}

//==================================================================================
// II. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_compression() {
        let config = PagesSerdeConfig::default();
        assert!(!config.compression_enabled);
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.min_compression_ratio, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = PagesSerdeConfig::from_json(r#"{ "compression_enabled": true }"#).unwrap();
        assert!(config.compression_enabled);
        assert_eq!(config.compression_level, 3);
    }

    #[test]
    fn test_from_json_rejects_bad_ratio() {
        let result = PagesSerdeConfig::from_json(r#"{ "min_compression_ratio": 1.5 }"#);
        assert!(matches!(result, Err(PagesSerdeError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_rejects_bad_level() {
        let result = PagesSerdeConfig::from_json(r#"{ "compression_level": 1000 }"#);
        assert!(matches!(result, Err(PagesSerdeError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let result = PagesSerdeConfig::from_json(r#"{ "spill_path": "/tmp" }"#);
        assert!(matches!(result, Err(PagesSerdeError::SerdeJson(_))));
    }
}
