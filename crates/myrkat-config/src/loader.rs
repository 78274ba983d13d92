//! Configuration loading.
//!
//! Resolution order:
//! 1. Explicit path passed by the caller (must exist)
//! 2. `~/.config/myrkat/config.toml` (skipped when absent)
//! 3. Built-in defaults
//!
//! Environment overrides are applied on top of whichever source won.

use crate::config::{ConfigError, MyrkatConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overrides the storage data directory.
pub const ENV_DATA_DIR: &str = "MYRKAT_DATA_DIR";

/// Overrides the logging level.
pub const ENV_LOG_LEVEL: &str = "MYRKAT_LOG_LEVEL";

/// Loads [`MyrkatConfig`] from TOML files and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from an explicit path, or the default location.
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<MyrkatConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::load_from_file(&default)?,
                _ => {
                    debug!("No config file found, using defaults");
                    MyrkatConfig::default()
                }
            },
        };

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<MyrkatConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::load_from_str(&contents).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text.
    pub fn load_from_str(contents: &str) -> Result<MyrkatConfig, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// `~/.config/myrkat/config.toml`, if a config directory exists on this platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("myrkat").join("config.toml"))
    }

    /// Apply `MYRKAT_*` overrides read through `lookup`.
    ///
    /// Taking a lookup function keeps tests independent of the process environment.
    pub fn apply_env_overrides<F>(config: &mut MyrkatConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            debug!("{} overrides storage.data_dir", ENV_DATA_DIR);
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            debug!("{} overrides logging.level", ENV_LOG_LEVEL);
            config.logging.level = level;
        }
    }
}
