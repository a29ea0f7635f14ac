//! Native binding table - the libtcc C ABI entry points
//!
//! The compiler engine is reached only through this table. The real table is
//! resolved from the shared library by [`BindingTable::global`]; tests build
//! their own from Rust `extern "C"` functions and hand it to
//! [`Context::with_bindings`](crate::Context::with_bindings).

use crate::ffi::loader::{LibraryLoader, LoadError};
use libloading::Library;
use std::ffi::{c_char, c_int, c_void};
use std::sync::OnceLock;

/// Opaque compiler state owned by the native library
#[repr(C)]
pub struct TCCState {
    _private: [u8; 0],
}

/// Diagnostic callback type taken by `tcc_set_error_func`
pub type TCCErrorFunc = unsafe extern "C" fn(opaque: *mut c_void, msg: *const c_char);

/// Sentinel for `tcc_relocate` asking the library to allocate the image itself
pub const TCC_RELOCATE_AUTO: *mut c_void = 1 as *mut c_void;

/// Table of libtcc entry points
///
/// Every field is a plain function pointer, so the table is `Copy` and safe to
/// share between threads; the contexts created through it are not.
#[derive(Clone, Copy)]
pub struct BindingTable {
    pub tcc_new: unsafe extern "C" fn() -> *mut TCCState,
    pub tcc_delete: unsafe extern "C" fn(s: *mut TCCState),
    pub tcc_set_lib_path: unsafe extern "C" fn(s: *mut TCCState, path: *const c_char),
    pub tcc_set_error_func:
        unsafe extern "C" fn(s: *mut TCCState, opaque: *mut c_void, func: Option<TCCErrorFunc>),
    pub tcc_set_options: unsafe extern "C" fn(s: *mut TCCState, options: *const c_char),
    pub tcc_add_include_path:
        unsafe extern "C" fn(s: *mut TCCState, path: *const c_char) -> c_int,
    pub tcc_add_sysinclude_path:
        unsafe extern "C" fn(s: *mut TCCState, path: *const c_char) -> c_int,
    pub tcc_define_symbol:
        unsafe extern "C" fn(s: *mut TCCState, sym: *const c_char, value: *const c_char),
    pub tcc_undefine_symbol: unsafe extern "C" fn(s: *mut TCCState, sym: *const c_char),
    pub tcc_add_file: unsafe extern "C" fn(s: *mut TCCState, filename: *const c_char) -> c_int,
    pub tcc_compile_string: unsafe extern "C" fn(s: *mut TCCState, buf: *const c_char) -> c_int,
    pub tcc_set_output_type: unsafe extern "C" fn(s: *mut TCCState, output_type: c_int) -> c_int,
    pub tcc_add_library_path:
        unsafe extern "C" fn(s: *mut TCCState, path: *const c_char) -> c_int,
    pub tcc_add_library: unsafe extern "C" fn(s: *mut TCCState, name: *const c_char) -> c_int,
    pub tcc_add_symbol:
        unsafe extern "C" fn(s: *mut TCCState, name: *const c_char, val: *const c_void) -> c_int,
    pub tcc_output_file: unsafe extern "C" fn(s: *mut TCCState, filename: *const c_char) -> c_int,
    pub tcc_run:
        unsafe extern "C" fn(s: *mut TCCState, argc: c_int, argv: *mut *mut c_char) -> c_int,
    pub tcc_relocate: unsafe extern "C" fn(s: *mut TCCState, ptr: *mut c_void) -> c_int,
    pub tcc_get_symbol:
        unsafe extern "C" fn(s: *mut TCCState, name: *const c_char) -> *mut c_void,
}

/// The process-wide library and the table resolved from it
struct LoadedBindings {
    /// Never dropped: the function pointers in `table` point into it
    _library: Library,
    table: BindingTable,
}

static GLOBAL: OnceLock<Result<LoadedBindings, LoadError>> = OnceLock::new();

macro_rules! resolve {
    ($library:expr, $path:expr, $name:ident) => {{
        let symbol = $library
            .get(concat!(stringify!($name), "\0").as_bytes())
            .map_err(|e| LoadError::MissingEntryPoint {
                library: $path.clone(),
                symbol: stringify!($name),
                reason: e.to_string(),
            })?;
        *symbol
    }};
}

impl BindingTable {
    /// Resolve every entry point from an already-loaded library
    ///
    /// # Safety
    ///
    /// The library must be libtcc (or ABI-compatible) and must outlive every
    /// use of the returned table.
    pub unsafe fn from_library(
        library: &Library,
        path: &std::path::Path,
    ) -> Result<Self, LoadError> {
        let path = path.to_path_buf();
        Ok(Self {
            tcc_new: resolve!(library, path, tcc_new),
            tcc_delete: resolve!(library, path, tcc_delete),
            tcc_set_lib_path: resolve!(library, path, tcc_set_lib_path),
            tcc_set_error_func: resolve!(library, path, tcc_set_error_func),
            tcc_set_options: resolve!(library, path, tcc_set_options),
            tcc_add_include_path: resolve!(library, path, tcc_add_include_path),
            tcc_add_sysinclude_path: resolve!(library, path, tcc_add_sysinclude_path),
            tcc_define_symbol: resolve!(library, path, tcc_define_symbol),
            tcc_undefine_symbol: resolve!(library, path, tcc_undefine_symbol),
            tcc_add_file: resolve!(library, path, tcc_add_file),
            tcc_compile_string: resolve!(library, path, tcc_compile_string),
            tcc_set_output_type: resolve!(library, path, tcc_set_output_type),
            tcc_add_library_path: resolve!(library, path, tcc_add_library_path),
            tcc_add_library: resolve!(library, path, tcc_add_library),
            tcc_add_symbol: resolve!(library, path, tcc_add_symbol),
            tcc_output_file: resolve!(library, path, tcc_output_file),
            tcc_run: resolve!(library, path, tcc_run),
            tcc_relocate: resolve!(library, path, tcc_relocate),
            tcc_get_symbol: resolve!(library, path, tcc_get_symbol),
        })
    }

    /// The process-wide table, loading libtcc on first use
    ///
    /// The library is located with [`LibraryLoader::from_env`]. Whatever the
    /// first call observes (success or failure) is what every later call sees.
    pub fn global() -> Result<&'static BindingTable, LoadError> {
        Self::global_with(LibraryLoader::from_env)
    }

    /// Like [`BindingTable::global`], with an explicit loader for the first load
    ///
    /// Has no effect on the search if the library was already loaded.
    pub fn global_with(
        loader: impl FnOnce() -> LibraryLoader,
    ) -> Result<&'static BindingTable, LoadError> {
        GLOBAL
            .get_or_init(|| {
                let loader = loader();
                let (path, library) = loader.open()?;
                let table = unsafe { BindingTable::from_library(&library, &path)? };
                log::debug!("libtcc loaded from {}", path.display());
                Ok(LoadedBindings {
                    _library: library,
                    table,
                })
            })
            .as_ref()
            .map(|loaded| &loaded.table)
            .map_err(Clone::clone)
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("tcc_new", &(self.tcc_new as *const c_void))
            .finish_non_exhaustive()
    }
}
