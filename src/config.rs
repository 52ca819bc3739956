//! Catalog configuration
//!
//! Loaded from `config.json` in the data directory. Missing files give the
//! defaults; partial files are merged over the defaults field by field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// Which repository implementation backs the catalog
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON document for the whole catalog
    #[default]
    Flat,
    /// One SQLite row per record and category
    Document,
}

/// Catalog settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Where the catalog document/database lives
    pub data_dir: PathBuf,
    pub backend: Backend,
    /// Extensions picked up by folder import (lowercase, no dot)
    pub image_extensions: Vec<String>,
    /// Extensions treated as video when files are picked
    pub video_extensions: Vec<String>,
    /// Window of the Recent filter, in days
    pub recent_days: i64,
    /// Color-match precision used when a query does not set one
    pub default_precision: f64,
    /// Parallel tagging requests
    pub tag_concurrency: usize,
    /// Parallel color-extraction requests
    pub color_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::Flat,
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video_extensions: ["mp4", "mov", "avi", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recent_days: 7,
            default_precision: 0.8,
            tag_concurrency: 1,
            color_concurrency: 2,
        }
    }
}

/// Get the directory where the catalog should be stored
///
/// - Linux: ~/.local/share/media-catalog
/// - macOS: ~/Library/Application Support/media-catalog
/// - Windows: %APPDATA%\media-catalog
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media-catalog")
}

impl CatalogConfig {
    pub const FILE_NAME: &'static str = "config.json";

    /// Load configuration from `path`, falling back to defaults when the file
    /// is missing.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| CatalogError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Merge a (possibly partial) JSON config over the defaults.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let saved: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| CatalogError::Config(format!("Failed to parse config: {}", e)))?;
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        if let (Some(saved), Some(defaults)) = (saved.as_object(), merged.as_object_mut()) {
            for (key, value) in saved {
                // Unknown keys are ignored, known ones replace the default
                if defaults.contains_key(key) {
                    defaults.insert(key.clone(), value.clone());
                }
            }
        }

        let config: Self = serde_json::from_value(merged)
            .map_err(|e| CatalogError::Config(format!("Invalid config value: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.recent_days < 0 {
            return Err(CatalogError::Config("recent_days must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.default_precision) {
            return Err(CatalogError::Config(
                "default_precision must be between 0 and 1".into(),
            ));
        }
        if self.tag_concurrency == 0 || self.color_concurrency == 0 {
            return Err(CatalogError::Config("queue concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Save the configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CatalogError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| CatalogError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn is_image_extension(&self, extension: &str) -> bool {
        self.image_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    pub fn is_video_extension(&self, extension: &str) -> bool {
        self.video_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = CatalogConfig::load(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.recent_days, 7);
        assert_eq!(config.backend, Backend::Flat);
    }

    #[test]
    fn test_partial_config_merges_over_defaults() {
        let config = CatalogConfig::from_json(
            r#"{ "backend": "document", "recent_days": 14, "something_else": true }"#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Document);
        assert_eq!(config.recent_days, 14);
        assert_eq!(config.default_precision, 0.8);
        assert!(config.is_image_extension("JPG"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(CatalogConfig::from_json(r#"{ "backend": "cloud" }"#).is_err());
        assert!(CatalogConfig::from_json(r#"{ "default_precision": 3.0 }"#).is_err());
        assert!(CatalogConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CatalogConfig::FILE_NAME);
        let config = CatalogConfig {
            data_dir: temp_dir.path().to_path_buf(),
            tag_concurrency: 4,
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(CatalogConfig::load(&path).unwrap(), config);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Any recent window and precision in range survives a merge untouched
        #[test]
        fn prop_in_range_values_survive_merge(days in 0i64..3650, precision in 0.0f64..=1.0) {
            let json = serde_json::json!({ "recent_days": days, "default_precision": precision });
            let config = CatalogConfig::from_json(&json.to_string()).unwrap();
            prop_assert_eq!(config.recent_days, days);
            prop_assert!((config.default_precision - precision).abs() < f64::EPSILON);
        }
    }
}
