//! Check command - compile and link in memory without running

use super::{compile, open_context, require_source};
use crate::config::Settings;
use anyhow::{Context as _, Result};
use embedcc_runtime::RelocateMode;
use std::path::Path;

/// Compile the file and resolve its symbols, reporting diagnostics on stderr
pub fn run(file: &Path, settings: &Settings) -> Result<()> {
    require_source(file)?;

    let mut ctx = open_context(settings)?;
    compile(&mut ctx, file)?;
    let size = ctx
        .relocate(RelocateMode::QuerySize)
        .and_then(|size| ctx.relocate(RelocateMode::Auto).map(|_| size))
        .with_context(|| format!("linking {} failed", file.display()))?;
    log::debug!("{} links into {} bytes", file.display(), size);

    println!("{}: No errors found", file.display());
    Ok(())
}
