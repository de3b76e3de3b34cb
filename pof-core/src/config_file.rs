//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! A serde mirror of [`PofConfig`](crate::config::PofConfig) is deserialized
//! and then converted through the builder, so file values go through the
//! same validation as programmatic ones.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `PofConfig::from_yaml("pof.yaml")`
//! - **TOML** (requires `config-file` feature): `PofConfig::from_toml("pof.toml")`
//! - **Environment Variables** (always available): `PofConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! reference-enabled: true
//! max-depth: 256
//! buffer-capacity: 4096
//! compact-values: true
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PofConfig, PofConfigBuilder};

/// File-based serialization settings.
///
/// Every field is optional; missing fields keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilePofConfig {
    /// Track references unless a call chooses otherwise.
    pub reference_enabled: Option<bool>,
    /// Maximum nesting of containers and user types.
    pub max_depth: Option<usize>,
    /// Initial capacity of output buffers in bytes.
    pub buffer_capacity: Option<usize>,
    /// Emit single-code encodings for small values.
    pub compact_values: Option<bool>,
}

impl TryFrom<FilePofConfig> for PofConfig {
    type Error = ConfigError;

    fn try_from(file: FilePofConfig) -> Result<Self, Self::Error> {
        let mut builder = PofConfigBuilder::new();

        if let Some(enabled) = file.reference_enabled {
            builder = builder.reference_enabled(enabled);
        }

        if let Some(depth) = file.max_depth {
            builder = builder.max_depth(depth);
        }

        if let Some(capacity) = file.buffer_capacity {
            builder = builder.buffer_capacity(capacity);
        }

        if let Some(compact) = file.compact_values {
            builder = builder.compact_values(compact);
        }

        builder.build()
    }
}

impl PofConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        let file_config: FilePofConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse YAML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        let file_config: FilePofConfig = toml_crate::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `POF_REFERENCE_ENABLED` | `"true"` or `"false"` |
    /// | `POF_MAX_DEPTH` | Maximum nesting depth |
    /// | `POF_BUFFER_CAPACITY` | Initial output buffer capacity in bytes |
    /// | `POF_COMPACT_VALUES` | `"true"` or `"false"` |
    ///
    /// Variables that are unset keep their defaults. Numbers that fail to
    /// parse are rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FilePofConfig::default();

        if let Ok(val) = std::env::var("POF_REFERENCE_ENABLED") {
            file_config.reference_enabled = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Ok(val) = std::env::var("POF_MAX_DEPTH") {
            file_config.max_depth = Some(parse_number("POF_MAX_DEPTH", &val)?);
        }

        if let Ok(val) = std::env::var("POF_BUFFER_CAPACITY") {
            file_config.buffer_capacity = Some(parse_number("POF_BUFFER_CAPACITY", &val)?);
        }

        if let Ok(val) = std::env::var("POF_COMPACT_VALUES") {
            file_config.compact_values = Some(val.eq_ignore_ascii_case("true"));
        }

        file_config.try_into()
    }
}

fn parse_number(name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::new(format!("invalid value for {name}: {e}")))
}

/// Loads a configuration file, detecting the format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<PofConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => PofConfig::from_yaml(path),
        Some("toml") => PofConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults_produce_default_config() {
        let config: PofConfig = FilePofConfig::default().try_into().unwrap();
        assert_eq!(config, PofConfig::default());
    }

    #[test]
    fn test_file_config_overrides() {
        let file_config = FilePofConfig {
            reference_enabled: Some(true),
            max_depth: Some(64),
            ..Default::default()
        };
        let config: PofConfig = file_config.try_into().unwrap();
        assert!(config.reference_enabled());
        assert_eq!(config.max_depth(), 64);
        assert!(config.compact_values());
    }

    #[test]
    fn test_file_config_is_validated() {
        let file_config = FilePofConfig {
            max_depth: Some(0),
            ..Default::default()
        };
        assert!(PofConfig::try_from(file_config).is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("POF_MAX_DEPTH", "77");
        std::env::set_var("POF_COMPACT_VALUES", "FALSE");
        let config = PofConfig::from_env().unwrap();
        std::env::remove_var("POF_MAX_DEPTH");
        std::env::remove_var("POF_COMPACT_VALUES");
        assert_eq!(config.max_depth(), 77);
        assert!(!config.compact_values());
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert!(parse_number("POF_MAX_DEPTH", "deep").is_err());
        assert_eq!(parse_number("POF_MAX_DEPTH", " 12 ").unwrap(), 12);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_yaml_round_trip() {
        let file_config = FilePofConfig {
            reference_enabled: Some(true),
            buffer_capacity: Some(1024),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&file_config).unwrap();
        assert!(yaml.contains("buffer-capacity"));
        let parsed: FilePofConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, file_config);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_toml_round_trip() {
        let file_config = FilePofConfig {
            max_depth: Some(128),
            compact_values: Some(false),
            ..Default::default()
        };
        let toml_str = toml_crate::to_string(&file_config).unwrap();
        let parsed: FilePofConfig = toml_crate::from_str(&toml_str).unwrap();
        assert_eq!(parsed, file_config);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_load_config_rejects_unknown_extension() {
        let err = load_config("pof.json").unwrap_err();
        assert!(err.message().contains(".json"));
    }
}
