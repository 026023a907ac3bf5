//! Recognition Configuration
//!
//! Engine settings and user-authored keyword rule sets, stored in TOML format.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::matcher::KeywordRule;

/// Fixed confidence threshold: recognized words below this are dropped.
pub const MIN_WORD_CONFIDENCE: i32 = 60;

/// Lower bound for the pre-recognition downscale factor.
pub const MIN_DOWNSCALE: f32 = 0.25;

/// Upper bound for the pre-recognition downscale factor.
pub const MAX_DOWNSCALE: f32 = 1.0;

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language code (e.g., "eng")
    pub language: String,
    /// Path to the native engine's data files, or None for the system default
    pub data_path: Option<PathBuf>,
    /// Downscale factor applied before recognition (clamped to [0.25, 1.0])
    #[serde(default = "default_downscale", deserialize_with = "de_downscale")]
    pub downscale: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            data_path: None,
            downscale: 1.0,
        }
    }
}

impl OcrConfig {
    /// Set the downscale factor, clamped to the supported range.
    pub fn set_downscale(&mut self, scale: f32) {
        self.downscale = scale.clamp(MIN_DOWNSCALE, MAX_DOWNSCALE);
    }
}

fn default_downscale() -> f32 {
    MAX_DOWNSCALE
}

fn de_downscale<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f32::deserialize(deserializer)?;
    Ok(raw.clamp(MIN_DOWNSCALE, MAX_DOWNSCALE))
}

/// A user-authored set of keyword rules, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Load engine configuration from a TOML file
pub fn load_config(path: &Path) -> Result<OcrConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: OcrConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save engine configuration to a TOML file
pub fn save_config(config: &OcrConfig, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a keyword rule set from a TOML file
pub fn load_rules(path: &Path) -> Result<RuleSet, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let rules: RuleSet = toml::from_str(&content)?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "eng");
        assert!(config.data_path.is_none());
        assert_eq!(config.downscale, 1.0);
    }

    #[test]
    fn test_downscale_clamped() {
        let mut config = OcrConfig::default();
        config.set_downscale(0.1);
        assert_eq!(config.downscale, MIN_DOWNSCALE);
        config.set_downscale(2.0);
        assert_eq!(config.downscale, MAX_DOWNSCALE);
        config.set_downscale(0.5);
        assert_eq!(config.downscale, 0.5);
    }

    #[test]
    fn test_downscale_clamped_on_load() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "language = \"eng\"\ndownscale = 0.05").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.downscale, MIN_DOWNSCALE);
    }

    #[test]
    fn test_config_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = OcrConfig::default();
        config.language = "deu".to_string();
        config.data_path = Some(PathBuf::from("/usr/share/tessdata"));
        config.set_downscale(0.5);

        save_config(&config, file.path()).unwrap();
        let loaded = load_config(file.path()).unwrap();

        assert_eq!(loaded.language, "deu");
        assert_eq!(loaded.data_path, config.data_path);
        assert_eq!(loaded.downscale, 0.5);
    }

    #[test]
    fn test_load_missing_config() {
        let result = load_config(Path::new("/nonexistent/keyword-lens.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_rule_set_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[rules]]
keyword = "Revenue"
partial = true

[rules.style]
marker_id = "revenue-pin"
color = [255, 200, 0]

[[rules]]
keyword = "CEO comment"
partial = false

[rules.style]
marker_id = "ceo-pin"
color = [0, 128, 255]
"#
        )
        .unwrap();

        let set = load_rules(file.path()).unwrap();
        assert_eq!(set.rules.len(), 2);
        assert_eq!(set.rules[0].keyword, "Revenue");
        assert!(set.rules[0].partial);
        assert_eq!(set.rules[1].style.marker_id, "ceo-pin");
    }
}
