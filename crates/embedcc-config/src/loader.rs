//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{CompilerConfig, OutputKind, ProjectConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_FILE: &str = "embedcc.toml";

/// Path to libtcc (file or directory)
pub const ENV_LIBRARY: &str = "EMBEDCC_LIBRARY";
/// libtcc runtime file directory
pub const ENV_LIB_PATH: &str = "EMBEDCC_LIB_PATH";
/// Compiler option string
pub const ENV_OPTIONS: &str = "EMBEDCC_OPTIONS";
/// Output type name
pub const ENV_OUTPUT: &str = "EMBEDCC_OUTPUT";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.embedcc/config.toml) - lowest priority
/// 2. Project config (./embedcc.toml) - overrides global
/// 3. Environment variables (EMBEDCC_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration, with environment overrides applied
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where embedcc.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read the global config from `path` instead of the home directory
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find embedcc.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let global_config = self.load_global_config()?;
        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config()?;
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); no file found is not an error
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration; a missing file or home directory yields defaults
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Some(library) = env::var_os(ENV_LIBRARY) {
            config.runtime_mut().library = Some(PathBuf::from(library));
        }

        if let Some(lib_path) = env::var_os(ENV_LIB_PATH) {
            config.compiler_mut().lib_path = Some(PathBuf::from(lib_path));
        }

        if let Ok(options) = env::var(ENV_OPTIONS) {
            config.compiler_mut().options = Some(options);
        }

        if let Ok(output) = env::var(ENV_OUTPUT) {
            let kind = output.parse::<OutputKind>().map_err(|_| ConfigError::InvalidValue {
                field: ENV_OUTPUT.to_string(),
                reason: format!(
                    "must be one of memory, exe, dll, obj, preprocess; got '{}'",
                    output
                ),
            })?;
            config.compiler_mut().output = Some(kind);
        }

        Ok(config)
    }

    /// Get the global configuration directory (~/.embedcc)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".embedcc"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Resolve a configured path against the project root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.project_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Effective compiler library (project/env > global)
    pub fn library(&self) -> Option<PathBuf> {
        self.project
            .library()
            .map(|p| self.resolve_path(p))
            .or_else(|| self.global.library().map(Path::to_path_buf))
    }

    /// Effective libtcc runtime directory (project/env > global)
    pub fn lib_path(&self) -> Option<PathBuf> {
        self.project
            .compiler
            .as_ref()
            .and_then(|c| c.lib_path.as_deref())
            .map(|p| self.resolve_path(p))
            .or_else(|| self.global.default_lib_path().map(Path::to_path_buf))
    }

    /// Effective option string (project/env > global)
    pub fn options(&self) -> Option<String> {
        self.project
            .compiler
            .as_ref()
            .and_then(|c| c.options.clone())
            .or_else(|| self.global.default_options().map(str::to_string))
    }

    pub fn output(&self) -> Option<OutputKind> {
        self.project.compiler.as_ref().and_then(|c| c.output)
    }

    /// The `[compiler]` section with relative paths resolved and global
    /// defaults filled in
    pub fn compiler(&self) -> CompilerConfig {
        let mut compiler = self.project.compiler();
        compiler.lib_path = self.lib_path();
        compiler.options = self.options();
        for paths in [
            &mut compiler.include_paths,
            &mut compiler.sysinclude_paths,
            &mut compiler.library_paths,
        ] {
            for path in paths.iter_mut() {
                *path = self.resolve_path(path);
            }
        }
        compiler
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has embedcc.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn clear_env() {
        for var in [ENV_LIBRARY, ENV_LIB_PATH, ENV_OPTIONS, ENV_OUTPUT] {
            env::remove_var(var);
        }
    }

    fn isolated_loader(dir: &Path) -> ConfigLoader {
        clear_env();
        ConfigLoader::new().with_global_config_path(dir.join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[compiler]
libraries = ["m"]
"#,
        );

        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.compiler().libraries, vec!["m".to_string()]);
        assert!(config.is_project());
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[compiler]\n");

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_relative_paths_resolve_against_root() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[compiler]
include_paths = ["include", "/abs/include"]
lib_path = "tcc"
"#,
        );

        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_directory(temp_dir.path()).unwrap();
        let compiler = config.compiler();

        assert_eq!(
            compiler.include_paths,
            vec![temp_dir.path().join("include"), PathBuf::from("/abs/include")]
        );
        assert_eq!(compiler.lib_path, Some(temp_dir.path().join("tcc")));
    }

    #[test]
    #[serial]
    fn test_global_defaults_fill_gaps() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            r#"
[defaults]
options = "-g"
lib_path = "/opt/tcc/lib"
"#,
        )
        .unwrap();

        clear_env();
        let mut loader = ConfigLoader::new().with_global_config_path(&global_path);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.options().as_deref(), Some("-g"));
        assert_eq!(config.lib_path(), Some(PathBuf::from("/opt/tcc/lib")));
    }

    #[test]
    #[serial]
    fn test_env_override_options() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[compiler]
options = "-Wall"
"#,
        );

        let mut loader = isolated_loader(temp_dir.path());
        env::set_var(ENV_OPTIONS, "-O2");
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.options().as_deref(), Some("-O2"));

        env::remove_var(ENV_OPTIONS);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_output() {
        let temp_dir = TempDir::new().unwrap();

        let mut loader = isolated_loader(temp_dir.path());
        env::set_var(ENV_OUTPUT, "elf");
        let result = loader.load_from_directory(temp_dir.path());

        env::remove_var(ENV_OUTPUT);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_load_from_specific_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config_file(
            temp_dir.path(),
            r#"
[runtime]
library = "vendor/libtcc.so"
"#,
        );

        let mut loader = isolated_loader(temp_dir.path());
        let config = loader.load_from_file(&config_path).unwrap();

        assert_eq!(config.library(), Some(temp_dir.path().join("vendor/libtcc.so")));
    }
}
