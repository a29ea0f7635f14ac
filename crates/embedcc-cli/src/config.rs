//! Merging of configuration files, environment and command-line flags
//!
//! The configuration crate already folds global, project and `EMBEDCC_*`
//! settings together; this module lays the command line on top and produces
//! the [`ContextOptions`] handed to the runtime.

use anyhow::{Context as _, Result};
use clap::Args;
use embedcc_config::{Config, ConfigLoader};
use embedcc_runtime::{ContextOptions, OutputType};
use std::path::{Path, PathBuf};

/// Compiler flags shared by `run`, `check` and `build`
#[derive(Debug, Clone, Default, Args)]
pub struct CompileFlags {
    /// Add a directory to the include search path
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include_paths: Vec<PathBuf>,

    /// Add a directory to the system include search path
    #[arg(long = "sysinclude", value_name = "DIR")]
    pub sysinclude_paths: Vec<PathBuf>,

    /// Add a directory to the library search path
    #[arg(short = 'L', long = "library-path", value_name = "DIR")]
    pub library_paths: Vec<PathBuf>,

    /// Link against a library (as `-l` would)
    #[arg(short = 'l', long = "link", value_name = "NAME")]
    pub libraries: Vec<String>,

    /// Define a preprocessor macro
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,

    /// Undefine a preprocessor macro
    #[arg(short = 'U', long = "undefine", value_name = "NAME")]
    pub undefines: Vec<String>,

    /// Raw option string passed to the compiler (e.g. "-Wall -g")
    #[arg(long, value_name = "OPTIONS", allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Directory holding libtcc's runtime files (libtcc1.a, bundled headers)
    #[arg(long, value_name = "DIR", env = "EMBEDCC_LIB_PATH")]
    pub lib_path: Option<PathBuf>,
}

/// Everything needed to load libtcc and configure a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Explicit compiler library, file or directory
    pub library: Option<PathBuf>,
    pub options: ContextOptions,
}

/// Load configuration from `start_dir` upwards and apply the command line
pub fn resolve(
    flags: &CompileFlags,
    library: Option<PathBuf>,
    output: Option<OutputType>,
    start_dir: &Path,
) -> Result<Settings> {
    let config = ConfigLoader::new()
        .load_from_directory(start_dir)
        .context("failed to load embedcc configuration")?;
    if let Some(root) = config.project_root() {
        log::debug!("using project configuration from {}", root.display());
    }
    merge(&config, flags, library, output)
}

/// Lay command-line settings over a loaded configuration
///
/// Search paths given on the command line are searched before configured
/// ones; libraries and macros from the command line are applied after.
pub fn merge(
    config: &Config,
    flags: &CompileFlags,
    library: Option<PathBuf>,
    output: Option<OutputType>,
) -> Result<Settings> {
    let compiler = config.compiler();

    let output_type = match output {
        Some(output) => Some(output),
        None => config
            .output()
            .map(|kind| kind.as_str().parse::<OutputType>())
            .transpose()?,
    };

    let mut defines = compiler.define_pairs();
    defines.extend(flags.defines.iter().map(|d| ContextOptions::parse_define(d)));

    let options = ContextOptions {
        lib_path: flags.lib_path.clone().or(compiler.lib_path),
        include_paths: chain(&flags.include_paths, compiler.include_paths),
        sysinclude_paths: chain(&flags.sysinclude_paths, compiler.sysinclude_paths),
        library_paths: chain(&flags.library_paths, compiler.library_paths),
        libraries: compiler
            .libraries
            .into_iter()
            .chain(flags.libraries.iter().cloned())
            .collect(),
        defines,
        undefines: compiler
            .undefines
            .into_iter()
            .chain(flags.undefines.iter().cloned())
            .collect(),
        options: flags.options.clone().or(compiler.options),
        output_type,
    };

    Ok(Settings {
        library: library.or_else(|| config.library()),
        options,
    })
}

fn chain(first: &[PathBuf], then: Vec<PathBuf>) -> Vec<PathBuf> {
    first.iter().cloned().chain(then).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedcc_config::{CompilerConfig, DefineValue, GlobalConfig, OutputKind, ProjectConfig};
    use pretty_assertions::assert_eq;

    fn config_with(compiler: CompilerConfig) -> Config {
        Config {
            project: ProjectConfig {
                compiler: Some(compiler),
                runtime: None,
            },
            global: GlobalConfig::default(),
            project_root: None,
        }
    }

    #[test]
    fn test_flags_without_config() {
        let flags = CompileFlags {
            include_paths: vec![PathBuf::from("inc")],
            defines: vec!["DEBUG".to_string(), "LEVEL=2".to_string()],
            options: Some("-Wall".to_string()),
            ..Default::default()
        };

        let settings = merge(&config_with(CompilerConfig::default()), &flags, None, None).unwrap();

        assert_eq!(settings.library, None);
        assert_eq!(settings.options.include_paths, vec![PathBuf::from("inc")]);
        assert_eq!(
            settings.options.defines,
            vec![
                ("DEBUG".to_string(), None),
                ("LEVEL".to_string(), Some("2".to_string())),
            ]
        );
        assert_eq!(settings.options.options.as_deref(), Some("-Wall"));
        assert_eq!(settings.options.output_type, None);
    }

    #[test]
    fn test_command_line_wins() {
        let mut compiler = CompilerConfig {
            include_paths: vec![PathBuf::from("/cfg/include")],
            libraries: vec!["m".to_string()],
            options: Some("-g".to_string()),
            lib_path: Some(PathBuf::from("/cfg/tcc")),
            output: Some(OutputKind::Obj),
            ..Default::default()
        };
        compiler
            .defines
            .insert("FROM_CONFIG".to_string(), DefineValue::Integer(1));

        let flags = CompileFlags {
            include_paths: vec![PathBuf::from("/cli/include")],
            libraries: vec!["dl".to_string()],
            defines: vec!["FROM_CLI".to_string()],
            options: Some("-O2".to_string()),
            lib_path: Some(PathBuf::from("/cli/tcc")),
            ..Default::default()
        };

        let settings = merge(
            &config_with(compiler),
            &flags,
            Some(PathBuf::from("/cli/libtcc.so")),
            Some(OutputType::Memory),
        )
        .unwrap();
        let options = settings.options;

        assert_eq!(settings.library, Some(PathBuf::from("/cli/libtcc.so")));
        assert_eq!(
            options.include_paths,
            vec![PathBuf::from("/cli/include"), PathBuf::from("/cfg/include")]
        );
        assert_eq!(options.libraries, vec!["m".to_string(), "dl".to_string()]);
        assert_eq!(
            options.defines,
            vec![
                ("FROM_CONFIG".to_string(), Some("1".to_string())),
                ("FROM_CLI".to_string(), None),
            ]
        );
        assert_eq!(options.options.as_deref(), Some("-O2"));
        assert_eq!(options.lib_path, Some(PathBuf::from("/cli/tcc")));
        assert_eq!(options.output_type, Some(OutputType::Memory));
    }

    #[test]
    fn test_configured_output_used_when_not_given() {
        let compiler = CompilerConfig {
            output: Some(OutputKind::Dll),
            ..Default::default()
        };

        let settings =
            merge(&config_with(compiler), &CompileFlags::default(), None, None).unwrap();

        assert_eq!(settings.options.output_type, Some(OutputType::Dll));
    }
}
