//! Declarative context setup
//!
//! [`ContextOptions`] collects everything that is normally passed to the
//! compiler on its command line; [`ContextBuilder`] applies it to a fresh
//! [`Context`] in the order libtcc expects (library path and options before
//! the output type, libraries after it).

use crate::context::{Context, OutputType};
use crate::error::ContextError;
use crate::ffi::bindings::BindingTable;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Context setup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("failed to create compiler context: {0}")]
    Create(#[source] ContextError),

    #[error("failed to apply {step}: {source}")]
    Step {
        step: String,
        #[source]
        source: ContextError,
    },
}

impl BuildError {
    fn step(step: impl Into<String>, source: ContextError) -> Self {
        BuildError::Step {
            step: step.into(),
            source,
        }
    }
}

/// Compiler settings applied before any source is compiled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Directory with libtcc's runtime files (`libtcc1.a`, headers)
    pub lib_path: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub sysinclude_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    /// Library names as given to `-l`
    pub libraries: Vec<String>,
    /// Macro definitions in order; `None` defines the macro as `1`
    pub defines: Vec<(String, Option<String>)>,
    pub undefines: Vec<String>,
    /// Free-form option string, e.g. `"-Wall -g"`
    pub options: Option<String>,
    /// Left unset, the context compiles to memory
    pub output_type: Option<OutputType>,
}

impl ContextOptions {
    /// Parse a `NAME` or `NAME=VALUE` definition
    pub fn parse_define(spec: &str) -> (String, Option<String>) {
        match spec.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (spec.to_string(), None),
        }
    }
}

type ErrorHandlerBox = Box<dyn FnMut(&str) + 'static>;

/// Builds a configured [`Context`]
#[derive(Default)]
pub struct ContextBuilder {
    options: ContextOptions,
    bindings: Option<&'static BindingTable>,
    error_func: Option<ErrorHandlerBox>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Use this binding table instead of the process-wide one
    pub fn with_bindings(mut self, bindings: &'static BindingTable) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Installed first, so diagnostics from the rest of the setup reach it
    pub fn with_error_func<F>(mut self, func: F) -> Self
    where
        F: FnMut(&str) + 'static,
    {
        self.error_func = Some(Box::new(func));
        self
    }

    pub fn with_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.lib_path = Some(path.into());
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.include_paths.push(path.into());
        self
    }

    pub fn with_sysinclude_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.sysinclude_paths.push(path.into());
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.library_paths.push(path.into());
        self
    }

    pub fn with_library(mut self, name: impl Into<String>) -> Self {
        self.options.libraries.push(name.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.options
            .defines
            .push((name.into(), value.map(str::to_string)));
        self
    }

    pub fn with_undefine(mut self, name: impl Into<String>) -> Self {
        self.options.undefines.push(name.into());
        self
    }

    pub fn with_compiler_options(mut self, options: impl Into<String>) -> Self {
        self.options.options = Some(options.into());
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.options.output_type = Some(output_type);
        self
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Create the context and apply every setting
    ///
    /// On failure the partially configured context is dropped, which tears
    /// it down.
    pub fn build(self) -> BuildResult<Context> {
        let mut ctx = match self.bindings {
            Some(bindings) => Context::with_bindings(bindings),
            None => Context::new(),
        }
        .map_err(BuildError::Create)?;

        if let Some(func) = self.error_func {
            ctx.set_error_func(func)
                .map_err(|e| BuildError::step("error handler", e))?;
        }

        let options = self.options;
        if let Some(path) = &options.lib_path {
            ctx.set_lib_path(path)
                .map_err(|e| BuildError::step(format!("lib path {}", path.display()), e))?;
        }
        if let Some(opts) = &options.options {
            ctx.set_options(opts)
                .map_err(|e| BuildError::step(format!("options '{}'", opts), e))?;
        }
        if let Some(output_type) = options.output_type {
            ctx.set_output_type(output_type)
                .map_err(|e| BuildError::step(format!("output type {}", output_type), e))?;
        }
        for path in &options.include_paths {
            ctx.add_include_path(path)
                .map_err(|e| BuildError::step(format!("include path {}", path.display()), e))?;
        }
        for path in &options.sysinclude_paths {
            ctx.add_sysinclude_path(path).map_err(|e| {
                BuildError::step(format!("system include path {}", path.display()), e)
            })?;
        }
        for path in &options.library_paths {
            ctx.add_library_path(path)
                .map_err(|e| BuildError::step(format!("library path {}", path.display()), e))?;
        }
        for (name, value) in &options.defines {
            ctx.define_symbol(name, value.as_deref())
                .map_err(|e| BuildError::step(format!("define {}", name), e))?;
        }
        for name in &options.undefines {
            ctx.undefine_symbol(name)
                .map_err(|e| BuildError::step(format!("undefine {}", name), e))?;
        }
        for name in &options.libraries {
            ctx.add_library(name)
                .map_err(|e| BuildError::step(format!("library {}", name), e))?;
        }

        log::debug!("compiler context configured: {:?}", options);
        Ok(ctx)
    }
}
