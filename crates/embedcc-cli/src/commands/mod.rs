pub mod build;
pub mod check;
pub mod run;

use crate::config::Settings;
use anyhow::{bail, Context as _, Result};
use embedcc_runtime::{BindingTable, Context, ContextBuilder, LibraryLoader};
use std::path::Path;

/// Fail early, before libtcc is loaded, when the source file is missing
fn require_source(file: &Path) -> Result<()> {
    if !file.is_file() {
        bail!("source file not found: {}", file.display());
    }
    Ok(())
}

/// Load libtcc, preferring an explicitly configured location
fn load_bindings(library: Option<&Path>) -> Result<&'static BindingTable> {
    BindingTable::global_with(|| match library {
        Some(path) if path.is_dir() => {
            let mut loader = LibraryLoader::new();
            loader.add_search_path(path);
            loader
        }
        Some(path) => LibraryLoader::new().with_library(path),
        None => LibraryLoader::from_env(),
    })
    .context("failed to load libtcc (use --library or EMBEDCC_LIBRARY to point at it)")
}

/// Create a configured context whose diagnostics go to stderr
fn open_context(settings: &Settings) -> Result<Context> {
    let bindings = load_bindings(settings.library.as_deref())?;
    ContextBuilder::new()
        .with_bindings(bindings)
        .with_options(settings.options.clone())
        .with_error_func(|message| eprintln!("{}", message))
        .build()
        .context("failed to configure the compiler")
}

/// Compile one file into `ctx`
fn compile(ctx: &mut Context, file: &Path) -> Result<()> {
    ctx.add_file(file)
        .with_context(|| format!("compilation of {} failed", file.display()))
}
