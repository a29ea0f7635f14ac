//! Build command - compile a C file to an executable, library or object

use super::{compile, open_context, require_source};
use crate::config::Settings;
use anyhow::{bail, Context as _, Result};
use embedcc_runtime::OutputType;
use std::path::PathBuf;

/// Output type used when neither the command line nor embedcc.toml picks one
pub const DEFAULT_OUTPUT: OutputType = OutputType::Exe;

pub struct BuildArgs {
    pub file: PathBuf,
    /// Path of the file to write
    pub out: PathBuf,
    pub settings: Settings,
}

pub fn run(mut args: BuildArgs) -> Result<()> {
    let output_type = *args
        .settings
        .options
        .output_type
        .get_or_insert(DEFAULT_OUTPUT);
    if output_type.is_memory() {
        bail!("output type 'memory' produces no file; use `embedcc run` instead");
    }
    require_source(&args.file)?;

    let mut ctx = open_context(&args.settings)?;
    compile(&mut ctx, &args.file)?;
    ctx.output_file(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    log::info!(
        "built {} ({}) from {}",
        args.out.display(),
        output_type,
        args.file.display()
    );
    Ok(())
}
