//! Project Configuration (embedcc.toml)
//!
//! Handles project-level configuration stored in `embedcc.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Project configuration from embedcc.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Compiler settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerConfig>,

    /// Compiler library location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,
}

/// `[compiler]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Directory with libtcc's runtime files (libtcc1.a, bundled headers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysinclude_paths: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library_paths: Vec<PathBuf>,

    /// Libraries to link, by `-l` name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,

    /// Preprocessor definitions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defines: BTreeMap<String, DefineValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undefines: Vec<String>,

    /// Free-form option string passed through to the compiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputKind>,
}

/// `[runtime]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Path to the libtcc shared library, or a directory holding it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,
}

/// Value of a `[compiler.defines]` entry
///
/// `NAME = true` defines the macro with the compiler's default value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DefineValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl DefineValue {
    /// Value to pass to the preprocessor; `None` means "defined, no value"
    pub fn as_define(&self) -> Option<String> {
        match self {
            DefineValue::Flag(true) => None,
            DefineValue::Flag(false) => Some("0".to_string()),
            DefineValue::Integer(n) => Some(n.to_string()),
            DefineValue::Text(s) => Some(s.clone()),
        }
    }
}

/// Output selector accepted in configuration files
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Memory,
    Exe,
    Dll,
    Obj,
    Preprocess,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Memory => "memory",
            OutputKind::Exe => "exe",
            OutputKind::Dll => "dll",
            OutputKind::Obj => "obj",
            OutputKind::Preprocess => "preprocess",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(OutputKind::Memory),
            "exe" => Ok(OutputKind::Exe),
            "dll" => Ok(OutputKind::Dll),
            "obj" => Ok(OutputKind::Obj),
            "preprocess" => Ok(OutputKind::Preprocess),
            _ => Err(ConfigError::InvalidValue {
                field: "output".to_string(),
                reason: format!(
                    "must be one of memory, exe, dll, obj, preprocess; got '{}'",
                    s
                ),
            }),
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(compiler) = &self.compiler {
            compiler.validate()?;
        }
        Ok(())
    }

    /// The `[compiler]` section, or an empty one
    pub fn compiler(&self) -> CompilerConfig {
        self.compiler.clone().unwrap_or_default()
    }

    pub fn library(&self) -> Option<&Path> {
        self.runtime.as_ref().and_then(|r| r.library.as_deref())
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.compiler.is_some() {
            self.compiler = other.compiler.clone();
        }
        if other.runtime.is_some() {
            self.runtime = other.runtime.clone();
        }
    }

    pub(crate) fn compiler_mut(&mut self) -> &mut CompilerConfig {
        self.compiler.get_or_insert_with(Default::default)
    }

    pub(crate) fn runtime_mut(&mut self) -> &mut RuntimeConfig {
        self.runtime.get_or_insert_with(Default::default)
    }
}

impl CompilerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        for name in self.defines.keys() {
            if !is_valid_macro_name(name) {
                return Err(ConfigError::InvalidValue {
                    field: format!("compiler.defines.{}", name),
                    reason: "not a valid C identifier".to_string(),
                });
            }
        }
        for name in &self.undefines {
            if !is_valid_macro_name(name) {
                return Err(ConfigError::InvalidValue {
                    field: "compiler.undefines".to_string(),
                    reason: format!("'{}' is not a valid C identifier", name),
                });
            }
        }
        if let Some(lib) = self.libraries.iter().find(|l| l.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "compiler.libraries".to_string(),
                reason: format!("library name cannot be empty ('{}')", lib),
            });
        }
        Ok(())
    }

    /// Definitions in `(name, value)` form, sorted by name
    pub fn define_pairs(&self) -> Vec<(String, Option<String>)> {
        self.defines
            .iter()
            .map(|(name, value)| (name.clone(), value.as_define()))
            .collect()
    }
}

/// C identifier: letter or underscore, then letters, digits, underscores
fn is_valid_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
