//! Compiler context - one libtcc compilation session
//!
//! A [`Context`] exclusively owns one native `TCCState` handle together with
//! every trampoline created for it. Operation ordering is validated locally
//! against [`ContextState`] before anything is forwarded to the native layer:
//!
//! ```text
//! Created ─▶ Configuring ─▶ Compiled ─┬─▶ Relocated ─────┐
//!                 ▲   │          │     └─▶ OutputWritten ─┴─▶ Deleted
//!                 └───┘          └─ (more units) ─┘
//! ```
//!
//! Teardown goes through [`Context::delete`], which `Drop` also calls: all
//! trampolines are released first, then the native handle.

use crate::error::{ContextError, ContextResult};
use crate::ffi::bindings::{BindingTable, TCCState, TCC_RELOCATE_AUTO};
use crate::ffi::callbacks::{TrampolineId, TrampolineRegistry};
use crate::ffi::caller::NativeFunction;
use crate::ffi::marshal::{encode, ArgvBuffer, MarshalError};
use crate::ffi::types::{CValue, Signature};
use std::collections::HashMap;
use std::ffi::{c_int, c_void, CString};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    /// Native handle allocated, nothing configured yet
    Created,
    /// At least one configuration call made
    Configuring,
    /// At least one unit compiled successfully
    Compiled,
    /// Code relocated into memory; symbols can be resolved
    Relocated,
    /// Output file written
    OutputWritten,
    /// Torn down; terminal
    Deleted,
}

impl ContextState {
    pub fn name(&self) -> &'static str {
        match self {
            ContextState::Created => "created",
            ContextState::Configuring => "configuring",
            ContextState::Compiled => "compiled",
            ContextState::Relocated => "relocated",
            ContextState::OutputWritten => "output-written",
            ContextState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const CONFIGURABLE: [ContextState; 3] = [
    ContextState::Created,
    ContextState::Configuring,
    ContextState::Compiled,
];

const BEFORE_COMPILE: [ContextState; 2] = [ContextState::Created, ContextState::Configuring];

/// What the compiler produces
///
/// Discriminants are libtcc's `TCC_OUTPUT_*` selector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OutputType {
    /// Run in process / resolve symbols after relocation
    Memory = 1,
    /// Executable file
    Exe = 2,
    /// Shared library
    Dll = 3,
    /// Object file
    Obj = 4,
    /// Preprocessed source only
    Preprocess = 5,
}

impl OutputType {
    pub const ALL: [OutputType; 5] = [
        OutputType::Memory,
        OutputType::Exe,
        OutputType::Dll,
        OutputType::Obj,
        OutputType::Preprocess,
    ];

    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputType::Memory => "memory",
            OutputType::Exe => "exe",
            OutputType::Dll => "dll",
            OutputType::Obj => "obj",
            OutputType::Preprocess => "preprocess",
        }
    }

    pub fn is_memory(self) -> bool {
        self == OutputType::Memory
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown output type name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output type '{0}' (expected memory, exe, dll, obj or preprocess)")]
pub struct ParseOutputTypeError(pub String);

impl FromStr for OutputType {
    type Err = ParseOutputTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        OutputType::ALL
            .into_iter()
            .find(|t| t.name() == lowered)
            .ok_or_else(|| ParseOutputTypeError(s.to_string()))
    }
}

/// Caller-provided memory for the relocated image
#[derive(Debug, Clone, Copy)]
pub struct ImageBuffer {
    ptr: *mut c_void,
}

impl ImageBuffer {
    /// # Safety
    ///
    /// `ptr` must be writable and executable, at least as large as the size
    /// reported by [`RelocateMode::QuerySize`], and must outlive every use
    /// of the code and symbols relocated into it.
    pub unsafe fn new(ptr: *mut c_void) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }
}

/// How [`Context::relocate`] places the compiled image
#[derive(Debug, Clone, Copy)]
pub enum RelocateMode {
    /// Only report the image size in bytes; no state change
    QuerySize,
    /// Let the library allocate and own the image
    Auto,
    /// Relocate into caller-provided memory
    Buffer(ImageBuffer),
}

fn check(operation: &'static str, code: c_int) -> ContextResult<c_int> {
    if code < 0 {
        log::debug!("{} returned {}", operation, code);
        Err(ContextError::NativeCallFailure { operation, code })
    } else {
        Ok(code)
    }
}

fn encode_path(path: &Path) -> ContextResult<CString> {
    let text = path.to_str().ok_or_else(|| {
        MarshalError::InvalidUtf8(format!("path {} is not valid UTF-8", path.display()))
    })?;
    Ok(encode(text)?)
}

/// One compilation session over a native libtcc handle
///
/// Holds a raw handle, so it is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```no_run
/// use embedcc_runtime::{CValue, Context, ExternType, RelocateMode, Signature};
///
/// let mut ctx = Context::new()?;
/// ctx.add_symbol("get_num", Signature::new(vec![], ExternType::I32), |_| CValue::I32(10))?;
/// ctx.compile_string("int get_num(void); int add(int a, int b) { return get_num() + a + b; }")?;
/// ctx.relocate(RelocateMode::Auto)?;
///
/// let sig = Signature::new(vec![ExternType::I32, ExternType::I32], ExternType::I32);
/// if let Some(add) = ctx.get_symbol("add", sig)? {
///     let sum = unsafe { add.call(&[CValue::I32(1), CValue::I32(2)]) }?;
///     assert_eq!(sum, CValue::I32(13));
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Context {
    bindings: &'static BindingTable,
    /// Null once deleted
    handle: *mut TCCState,
    state: ContextState,
    output_type: Option<OutputType>,
    /// Set only by an explicit, successful `relocate`
    linked: bool,
    /// `main` already ran through `tcc_run`
    ran: bool,
    trampolines: TrampolineRegistry,
    /// Host symbol name → trampoline bound to it
    host_symbols: HashMap<String, TrampolineId>,
    error_handler: Option<TrampolineId>,
}

impl Context {
    /// Create a context using the process-wide libtcc binding table
    pub fn new() -> ContextResult<Self> {
        Self::with_bindings(BindingTable::global()?)
    }

    /// Create a context over an explicit binding table
    pub fn with_bindings(bindings: &'static BindingTable) -> ContextResult<Self> {
        let handle = unsafe { (bindings.tcc_new)() };
        if handle.is_null() {
            return Err(ContextError::NativeCallFailure {
                operation: "new",
                code: -1,
            });
        }
        log::debug!("created compiler context {:p}", handle);
        Ok(Self {
            bindings,
            handle,
            state: ContextState::Created,
            output_type: None,
            linked: false,
            ran: false,
            trampolines: TrampolineRegistry::new(),
            host_symbols: HashMap::new(),
            error_handler: None,
        })
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Output type in effect; `None` until chosen or defaulted at first compile
    pub fn output_type(&self) -> Option<OutputType> {
        self.output_type
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ContextState::Deleted
    }

    /// Number of live trampolines (host symbols plus error handler)
    pub fn trampoline_count(&self) -> usize {
        self.trampolines.len()
    }

    pub fn has_host_symbol(&self, name: &str) -> bool {
        self.host_symbols.contains_key(name)
    }

    // ========================================================================
    // State checks
    // ========================================================================

    fn live(&self, operation: &'static str) -> ContextResult<*mut TCCState> {
        if self.state == ContextState::Deleted {
            log::error!("{} called on a deleted compiler context", operation);
            return Err(ContextError::UseAfterTeardown { operation });
        }
        Ok(self.handle)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[ContextState],
    ) -> ContextResult<*mut TCCState> {
        let handle = self.live(operation)?;
        if allowed.contains(&self.state) {
            Ok(handle)
        } else {
            Err(ContextError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn expect_output(&self, operation: &'static str, memory: bool) -> ContextResult<()> {
        let output_type = self.output_type.unwrap_or(OutputType::Memory);
        if output_type.is_memory() == memory {
            Ok(())
        } else {
            Err(ContextError::OutputMismatch {
                operation,
                output_type,
            })
        }
    }

    fn transition(&mut self, next: ContextState) {
        if self.state != next {
            log::debug!("compiler context {:p}: {} -> {}", self.handle, self.state, next);
            self.state = next;
        }
    }

    fn configured(&mut self) {
        if self.state == ContextState::Created {
            self.transition(ContextState::Configuring);
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set the directory holding libtcc's runtime support files
    pub fn set_lib_path(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("set_lib_path", &CONFIGURABLE)?;
        let path = encode_path(path.as_ref())?;
        log::trace!("tcc_set_lib_path({:?})", path);
        unsafe { (self.bindings.tcc_set_lib_path)(handle, path.as_ptr()) };
        self.configured();
        Ok(())
    }

    /// Pass a command-line style option string (`"-Wall -g"`)
    pub fn set_options(&mut self, options: &str) -> ContextResult<()> {
        let handle = self.expect_state("set_options", &CONFIGURABLE)?;
        let options = encode(options)?;
        log::trace!("tcc_set_options({:?})", options);
        unsafe { (self.bindings.tcc_set_options)(handle, options.as_ptr()) };
        self.configured();
        Ok(())
    }

    pub fn add_include_path(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("add_include_path", &CONFIGURABLE)?;
        let path = encode_path(path.as_ref())?;
        log::trace!("tcc_add_include_path({:?})", path);
        check("add_include_path", unsafe {
            (self.bindings.tcc_add_include_path)(handle, path.as_ptr())
        })?;
        self.configured();
        Ok(())
    }

    pub fn add_sysinclude_path(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("add_sysinclude_path", &CONFIGURABLE)?;
        let path = encode_path(path.as_ref())?;
        log::trace!("tcc_add_sysinclude_path({:?})", path);
        check("add_sysinclude_path", unsafe {
            (self.bindings.tcc_add_sysinclude_path)(handle, path.as_ptr())
        })?;
        self.configured();
        Ok(())
    }

    pub fn add_library_path(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("add_library_path", &CONFIGURABLE)?;
        let path = encode_path(path.as_ref())?;
        log::trace!("tcc_add_library_path({:?})", path);
        check("add_library_path", unsafe {
            (self.bindings.tcc_add_library_path)(handle, path.as_ptr())
        })?;
        self.configured();
        Ok(())
    }

    /// Link against a library by name, as `-l` would (`"m"` for libm)
    pub fn add_library(&mut self, name: &str) -> ContextResult<()> {
        let handle = self.expect_state("add_library", &CONFIGURABLE)?;
        let name = encode(name)?;
        log::trace!("tcc_add_library({:?})", name);
        check("add_library", unsafe {
            (self.bindings.tcc_add_library)(handle, name.as_ptr())
        })?;
        self.configured();
        Ok(())
    }

    /// Define a preprocessor macro; `None` defines it as `1`
    pub fn define_symbol(&mut self, name: &str, value: Option<&str>) -> ContextResult<()> {
        let handle = self.expect_state("define_symbol", &CONFIGURABLE)?;
        let name = encode(name)?;
        let value = value.map(encode).transpose()?;
        let value_ptr = value.as_ref().map_or(std::ptr::null(), |v| v.as_ptr());
        log::trace!("tcc_define_symbol({:?}, {:?})", name, value);
        unsafe { (self.bindings.tcc_define_symbol)(handle, name.as_ptr(), value_ptr) };
        self.configured();
        Ok(())
    }

    pub fn undefine_symbol(&mut self, name: &str) -> ContextResult<()> {
        let handle = self.expect_state("undefine_symbol", &CONFIGURABLE)?;
        let name = encode(name)?;
        log::trace!("tcc_undefine_symbol({:?})", name);
        unsafe { (self.bindings.tcc_undefine_symbol)(handle, name.as_ptr()) };
        self.configured();
        Ok(())
    }

    /// Route compiler diagnostics to `func`
    ///
    /// Replaces any previous handler; the old one is released once the new
    /// one is installed.
    pub fn set_error_func<F>(&mut self, func: F) -> ContextResult<()>
    where
        F: FnMut(&str) + 'static,
    {
        let handle = self.expect_state("set_error_func", &CONFIGURABLE)?;
        let (id, opaque, shim) = self.trampolines.register_error_handler(func);
        log::trace!("tcc_set_error_func({:p})", opaque);
        unsafe { (self.bindings.tcc_set_error_func)(handle, opaque, Some(shim)) };
        if let Some(previous) = self.error_handler.replace(id) {
            self.trampolines.release(previous);
        }
        self.configured();
        Ok(())
    }

    /// Remove the diagnostic handler; the library falls back to stderr
    pub fn clear_error_func(&mut self) -> ContextResult<()> {
        let handle = self.expect_state("clear_error_func", &CONFIGURABLE)?;
        log::trace!("tcc_set_error_func(null)");
        unsafe { (self.bindings.tcc_set_error_func)(handle, std::ptr::null_mut(), None) };
        if let Some(previous) = self.error_handler.take() {
            self.trampolines.release(previous);
        }
        self.configured();
        Ok(())
    }

    /// Choose what compilation produces; only before the first compile
    ///
    /// The type can be applied once. A compile attempt applies the `Memory`
    /// default even when it fails, which fixes the type as well.
    pub fn set_output_type(&mut self, output_type: OutputType) -> ContextResult<()> {
        let handle = self.expect_state("set_output_type", &BEFORE_COMPILE)?;
        if let Some(current) = self.output_type {
            return Err(ContextError::OutputTypeFixed {
                output_type: current,
            });
        }
        self.apply_output_type(handle, output_type)?;
        self.configured();
        Ok(())
    }

    fn apply_output_type(
        &mut self,
        handle: *mut TCCState,
        output_type: OutputType,
    ) -> ContextResult<()> {
        log::trace!("tcc_set_output_type({})", output_type);
        check("set_output_type", unsafe {
            (self.bindings.tcc_set_output_type)(handle, output_type.as_raw())
        })?;
        self.output_type = Some(output_type);
        Ok(())
    }

    // ========================================================================
    // Symbol exchange: host → native
    // ========================================================================

    /// Expose a host closure to compiled code under `name`
    ///
    /// The closure is wrapped in a trampoline matching `signature`. Adding a
    /// name again replaces the earlier closure; if the native bind fails the
    /// new trampoline is released and the earlier binding stays in place.
    pub fn add_symbol<F>(&mut self, name: &str, signature: Signature, func: F) -> ContextResult<()>
    where
        F: Fn(&[CValue]) -> CValue + 'static,
    {
        let handle = self.expect_state("add_symbol", &CONFIGURABLE)?;
        let c_name = encode(name)?;
        let (id, ptr) = self.trampolines.register_symbol(name, signature, func)?;

        log::trace!("tcc_add_symbol({:?}, {:p})", c_name, ptr);
        let code = unsafe { (self.bindings.tcc_add_symbol)(handle, c_name.as_ptr(), ptr) };
        if let Err(e) = check("add_symbol", code) {
            self.trampolines.release(id);
            return Err(e);
        }

        if let Some(previous) = self.host_symbols.insert(name.to_string(), id) {
            log::debug!("host symbol '{}' replaced", name);
            self.trampolines.release(previous);
        }
        self.configured();
        Ok(())
    }

    /// Expose a raw host address (data or `extern "C"` function) under `name`
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid, and match the type compiled code declares for
    /// `name`, for as long as this context can run code.
    pub unsafe fn add_symbol_ptr(&mut self, name: &str, ptr: *const c_void) -> ContextResult<()> {
        let handle = self.expect_state("add_symbol", &CONFIGURABLE)?;
        let c_name = encode(name)?;
        log::trace!("tcc_add_symbol({:?}, {:p})", c_name, ptr);
        check("add_symbol", (self.bindings.tcc_add_symbol)(handle, c_name.as_ptr(), ptr))?;
        if let Some(previous) = self.host_symbols.remove(name) {
            self.trampolines.release(previous);
        }
        self.configured();
        Ok(())
    }

    // ========================================================================
    // Compilation
    // ========================================================================

    fn ensure_output_type(&mut self, handle: *mut TCCState) -> ContextResult<()> {
        if self.output_type.is_none() {
            log::debug!("no output type chosen, compiling to memory");
            self.apply_output_type(handle, OutputType::Memory)?;
        }
        Ok(())
    }

    /// Compile (or, for objects and libraries, add for linking) a file
    ///
    /// Failure leaves the state unchanged; diagnostics go to the error
    /// handler if one is set.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("add_file", &CONFIGURABLE)?;
        let c_path = encode_path(path.as_ref())?;
        self.ensure_output_type(handle)?;
        log::trace!("tcc_add_file({:?})", c_path);
        check("add_file", unsafe {
            (self.bindings.tcc_add_file)(handle, c_path.as_ptr())
        })?;
        self.transition(ContextState::Compiled);
        Ok(())
    }

    /// Compile a source buffer
    pub fn compile_string(&mut self, source: &str) -> ContextResult<()> {
        let handle = self.expect_state("compile_string", &CONFIGURABLE)?;
        let c_source = encode(source)?;
        self.ensure_output_type(handle)?;
        log::trace!("tcc_compile_string({} bytes)", source.len());
        check("compile_string", unsafe {
            (self.bindings.tcc_compile_string)(handle, c_source.as_ptr())
        })?;
        self.transition(ContextState::Compiled);
        Ok(())
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Link the compiled code into memory
    ///
    /// Returns the image size for [`RelocateMode::QuerySize`] (state stays
    /// `Compiled`) and 0 otherwise (state becomes `Relocated`).
    pub fn relocate(&mut self, mode: RelocateMode) -> ContextResult<usize> {
        let handle = self.expect_state("relocate", &[ContextState::Compiled])?;
        self.expect_output("relocate", true)?;

        let target = match mode {
            RelocateMode::QuerySize => std::ptr::null_mut(),
            RelocateMode::Auto => TCC_RELOCATE_AUTO,
            RelocateMode::Buffer(buffer) => buffer.as_ptr(),
        };
        log::trace!("tcc_relocate({:p})", target);
        let code = check("relocate", unsafe { (self.bindings.tcc_relocate)(handle, target) })?;

        match mode {
            RelocateMode::QuerySize => Ok(code as usize),
            RelocateMode::Auto | RelocateMode::Buffer(_) => {
                self.linked = true;
                self.transition(ContextState::Relocated);
                Ok(0)
            }
        }
    }

    /// Write the build to `path` (executable, library, object or preprocessed)
    pub fn output_file(&mut self, path: impl AsRef<Path>) -> ContextResult<()> {
        let handle = self.expect_state("output_file", &[ContextState::Compiled])?;
        self.expect_output("output_file", false)?;
        let c_path = encode_path(path.as_ref())?;
        log::trace!("tcc_output_file({:?})", c_path);
        check("output_file", unsafe {
            (self.bindings.tcc_output_file)(handle, c_path.as_ptr())
        })?;
        self.transition(ContextState::OutputWritten);
        Ok(())
    }

    /// Run the compiled unit's `main` with `args` as `argv`
    ///
    /// Blocks until `main` returns and yields its result. From `Compiled` the
    /// library relocates first, so the context ends up `Relocated`; that
    /// internal link does not make symbols resolvable, since a failed link
    /// and `main` returning -1 look the same. `main` runs at most once.
    ///
    /// After an explicit [`relocate`](Self::relocate), whether `tcc_run` may
    /// follow depends on the libtcc version: 0.9.27 relocates again inside
    /// `tcc_run` and forbids it. Callers targeting such versions run from
    /// `Compiled` instead.
    pub fn run<S: AsRef<str>>(&mut self, args: &[S]) -> ContextResult<i32> {
        let handle =
            self.expect_state("run", &[ContextState::Compiled, ContextState::Relocated])?;
        if self.ran {
            return Err(ContextError::InvalidState {
                operation: "run",
                state: self.state,
            });
        }
        self.expect_output("run", true)?;
        let mut argv = ArgvBuffer::new(args)?;
        log::trace!("tcc_run(argc = {})", argv.argc());
        let code = unsafe { (self.bindings.tcc_run)(handle, argv.argc(), argv.argv()) };
        self.ran = true;
        self.transition(ContextState::Relocated);
        Ok(code)
    }

    // ========================================================================
    // Symbol exchange: native → host
    // ========================================================================

    fn lookup(&self, operation: &'static str, name: &str) -> ContextResult<Option<*mut c_void>> {
        let handle = self.live(operation)?;
        if self.state != ContextState::Relocated || !self.linked {
            return Err(ContextError::SymbolUnresolved {
                name: name.to_string(),
            });
        }
        let c_name = encode(name)?;
        log::trace!("tcc_get_symbol({:?})", c_name);
        let ptr = unsafe { (self.bindings.tcc_get_symbol)(handle, c_name.as_ptr()) };
        if ptr.is_null() {
            log::debug!("symbol '{}' not found", name);
            Ok(None)
        } else {
            Ok(Some(ptr))
        }
    }

    /// Resolve a compiled function as a callable with the given signature
    ///
    /// `Ok(None)` when the symbol does not exist. Calling the result is
    /// `unsafe`: `signature` must match the C definition.
    pub fn get_symbol(
        &self,
        name: &str,
        signature: Signature,
    ) -> ContextResult<Option<NativeFunction<'_>>> {
        match self.lookup("get_symbol", name)? {
            // SAFETY: the code lives as long as the context, which the result borrows
            Some(ptr) => Ok(Some(unsafe { NativeFunction::new(ptr, signature) }?)),
            None => Ok(None),
        }
    }

    /// Raw address of a compiled symbol (function or data)
    pub fn get_symbol_ptr(&self, name: &str) -> ContextResult<Option<*mut c_void>> {
        self.lookup("get_symbol_ptr", name)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release every trampoline, then the native handle
    ///
    /// Idempotent; later operations fail with `UseAfterTeardown`.
    pub fn delete(&mut self) {
        if self.state == ContextState::Deleted {
            return;
        }
        let released = self.trampolines.release_all();
        self.host_symbols.clear();
        self.error_handler = None;

        log::trace!("tcc_delete({:p})", self.handle);
        unsafe { (self.bindings.tcc_delete)(self.handle) };
        log::debug!(
            "deleted compiler context {:p} ({} trampoline(s) released)",
            self.handle,
            released
        );
        self.handle = std::ptr::null_mut();
        self.state = ContextState::Deleted;
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.delete();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("output_type", &self.output_type)
            .field("linked", &self.linked)
            .field("trampolines", &self.trampolines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("memory", OutputType::Memory)]
    #[case("EXE", OutputType::Exe)]
    #[case(" dll ", OutputType::Dll)]
    #[case("obj", OutputType::Obj)]
    #[case("Preprocess", OutputType::Preprocess)]
    fn test_output_type_parses(#[case] input: &str, #[case] expected: OutputType) {
        assert_eq!(input.parse::<OutputType>(), Ok(expected));
    }

    #[test]
    fn test_output_type_rejects_unknown() {
        assert_eq!(
            "elf".parse::<OutputType>(),
            Err(ParseOutputTypeError("elf".to_string()))
        );
    }

    #[test]
    fn test_output_type_selector_values() {
        let raw: Vec<c_int> = OutputType::ALL.iter().map(|t| t.as_raw()).collect();
        assert_eq!(raw, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_output_type_display_round_trips() {
        for output_type in OutputType::ALL {
            assert_eq!(output_type.to_string().parse::<OutputType>(), Ok(output_type));
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ContextState::OutputWritten.to_string(), "output-written");
        assert_eq!(ContextState::Deleted.to_string(), "deleted");
    }

    #[test]
    fn test_negative_code_is_failure() {
        assert_eq!(check("add_file", 0), Ok(0));
        assert_eq!(check("relocate", 4096), Ok(4096));
        assert_eq!(
            check("add_file", -1),
            Err(ContextError::NativeCallFailure {
                operation: "add_file",
                code: -1
            })
        );
    }
}
