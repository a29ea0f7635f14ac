//! Global Configuration (~/.embedcc/config.toml)
//!
//! Handles user-level configuration stored in `~/.embedcc/config.toml`.

use crate::project::RuntimeConfig;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.embedcc/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default compiler library location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// Default compiler settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default settings, used when a project does not set them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Directory with libtcc's runtime files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_path: Option<PathBuf>,

    /// Option string applied to every compile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(library) = self.library() {
            if library.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "runtime.library".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.embedcc/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".embedcc").join("config.toml"))
    }

    pub fn library(&self) -> Option<&Path> {
        self.runtime.as_ref().and_then(|r| r.library.as_deref())
    }

    pub fn default_lib_path(&self) -> Option<&Path> {
        self.defaults.as_ref().and_then(|d| d.lib_path.as_deref())
    }

    pub fn default_options(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.options.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.runtime.is_some() {
            self.runtime = other.runtime.clone();
        }
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
    }
}
