//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default directory holding one JSON file per collection.
pub const DEFAULT_DATA_DIR: &str = "myrkat-data";

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the file that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`MyrkatConfig`].
    #[error("Failed to parse config file {path}: {reason}")]
    Parse {
        /// Path of the file that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A field holds a value outside its allowed range.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Dotted field name
        field: String,
        /// Offending value
        value: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MyrkatConfig {
    /// Collection store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Plugin loading settings
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl MyrkatConfig {
    /// Check every field that has a restricted value range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.data_dir".to_string(),
                value: String::new(),
            });
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        Ok(())
    }

    /// Whether a plugin id is switched off by `plugins.disabled`.
    pub fn is_plugin_disabled(&self, plugin_id: &str) -> bool {
        self.plugins.disabled.iter().any(|id| id == plugin_id)
    }
}

/// Collection store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory that holds `<collection>.json` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Write collections as indented JSON
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pretty: default_pretty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// One of [`LOG_LEVELS`]
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Plugin configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PluginsConfig {
    /// Ids of built-in plugins that should not be registered
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_pretty() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MyrkatConfig::default();
        assert_eq!(config.storage.data_dir, PathBuf::from("myrkat-data"));
        assert!(config.storage.pretty);
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = MyrkatConfig::default();
        config.logging.level = "loud".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "logging.level"
        ));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = MyrkatConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_data_dir() {
        let mut config = MyrkatConfig::default();
        config.storage.data_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plugin_disabled_lookup() {
        let mut config = MyrkatConfig::default();
        config.plugins.disabled.push("myrkat-notes".to_string());

        assert!(config.is_plugin_disabled("myrkat-notes"));
        assert!(!config.is_plugin_disabled("other"));
    }
}
