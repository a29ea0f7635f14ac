//! Run command - compile a C file in memory and execute its `main`

use super::{compile, open_context, require_source};
use crate::config::Settings;
use anyhow::{Context as _, Result};
use std::path::PathBuf;

pub struct RunArgs {
    pub file: PathBuf,
    /// Arguments after `--`, passed to `main` after the program name
    pub args: Vec<String>,
    pub settings: Settings,
}

/// Compile and run the file, returning the exit code of its `main`
pub fn run(args: RunArgs) -> Result<i32> {
    require_source(&args.file)?;

    let mut ctx = open_context(&args.settings)?;
    compile(&mut ctx, &args.file)?;

    let mut argv = Vec::with_capacity(args.args.len() + 1);
    argv.push(args.file.display().to_string());
    argv.extend(args.args);

    let code = ctx
        .run(&argv)
        .with_context(|| format!("failed to run {}", args.file.display()))?;
    log::debug!("{} exited with {}", args.file.display(), code);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedcc_runtime::{ContextOptions, OutputType};

    #[test]
    fn test_run_missing_file() {
        let args = RunArgs {
            file: PathBuf::from("nonexistent.c"),
            args: vec![],
            settings: Settings {
                library: None,
                options: ContextOptions {
                    output_type: Some(OutputType::Memory),
                    ..Default::default()
                },
            },
        };

        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("source file not found"));
    }
}
