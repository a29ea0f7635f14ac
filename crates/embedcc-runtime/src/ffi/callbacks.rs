//! Callback trampolines - native-callable adapters for host closures
//!
//! Two kinds of trampoline exist:
//! - **Symbol trampolines** wrap a `Fn(&[CValue]) -> CValue` behind a libffi
//!   closure whose code pointer matches the requested [`Signature`]. Compiled
//!   C code calls it like any other function.
//! - **Error handlers** wrap a `FnMut(&str)` behind one fixed `extern "C"`
//!   shim; the closure travels through libtcc's opaque pointer.
//!
//! Every trampoline lives in a [`TrampolineRegistry`] owned by one
//! [`Context`](crate::Context). Dropping a trampoline releases its native
//! pointer, so the registry is the only place that decides when that happens.

use crate::ffi::bindings::TCCErrorFunc;
use crate::ffi::marshal::decode_lossy;
use crate::ffi::types::{CValue, ExternType, Signature};
use libffi::low::{ffi_arg, ffi_cif};
use libffi::middle::{Cif, Closure};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::{c_char, c_void};
use std::fmt;
use std::mem::ManuallyDrop;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// Errors that can occur during trampoline creation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// Signature cannot be expressed as a C function type
    #[error("unsupported callback signature {signature}: {reason}")]
    UnsupportedSignature { signature: String, reason: String },
}

/// Host closure invoked by compiled code
pub type HostFn = dyn Fn(&[CValue]) -> CValue + 'static;

/// Host closure receiving compiler diagnostics
pub type ErrorFn = dyn FnMut(&str) + 'static;

/// Stable handle of one trampoline inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrampolineId(u64);

impl fmt::Display for TrampolineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Target of a symbol trampoline
struct HostFunction {
    name: String,
    signature: Signature,
    func: Box<HostFn>,
}

/// Target of the error shim
struct ErrorHandler {
    func: RefCell<Box<ErrorFn>>,
}

enum TrampolineKind {
    Symbol {
        /// Dropped before `target`: the closure borrows it
        closure: ManuallyDrop<Closure<'static>>,
        target: *mut HostFunction,
    },
    Error {
        target: *mut ErrorHandler,
    },
}

/// A native-callable adapter wrapping one host closure
///
/// The native pointer is valid from creation until this value is dropped.
pub struct Trampoline {
    id: TrampolineId,
    kind: TrampolineKind,
}

impl Trampoline {
    pub fn id(&self) -> TrampolineId {
        self.id
    }

    /// Raw invocable pointer handed to the native side
    ///
    /// For error handlers this is the opaque pointer that accompanies the shim.
    pub fn native_ptr(&self) -> *const c_void {
        match &self.kind {
            TrampolineKind::Symbol { closure, .. } => *closure.code_ptr() as *const c_void,
            TrampolineKind::Error { target } => *target as *const c_void,
        }
    }

    /// Signature of a symbol trampoline
    pub fn signature(&self) -> Option<&Signature> {
        match &self.kind {
            // SAFETY: target is live until drop
            TrampolineKind::Symbol { target, .. } => Some(unsafe { &(**target).signature }),
            TrampolineKind::Error { .. } => None,
        }
    }

    pub fn is_error_handler(&self) -> bool {
        matches!(self.kind, TrampolineKind::Error { .. })
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        match &mut self.kind {
            TrampolineKind::Symbol { closure, target } => unsafe {
                ManuallyDrop::drop(closure);
                let target = Box::from_raw(*target);
                log::trace!("released trampoline {} for '{}'", self.id, target.name);
            },
            TrampolineKind::Error { target } => unsafe {
                drop(Box::from_raw(*target));
                log::trace!("released error handler {}", self.id);
            },
        }
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("id", &self.id)
            .field("native_ptr", &self.native_ptr())
            .field("error_handler", &self.is_error_handler())
            .finish()
    }
}

/// All trampolines created for one compiler context
#[derive(Default)]
pub struct TrampolineRegistry {
    entries: BTreeMap<TrampolineId, Trampoline>,
    next_id: u64,
}

impl TrampolineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> TrampolineId {
        let id = TrampolineId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create a symbol trampoline and record it
    ///
    /// Returns the id and the code pointer native code may call.
    pub fn register_symbol<F>(
        &mut self,
        name: &str,
        signature: Signature,
        func: F,
    ) -> Result<(TrampolineId, *const c_void), CallbackError>
    where
        F: Fn(&[CValue]) -> CValue + 'static,
    {
        if let Some(index) = signature.void_param() {
            return Err(CallbackError::UnsupportedSignature {
                signature: signature.to_string(),
                reason: format!("parameter {} is void", index),
            });
        }

        let cif = Cif::new(
            signature.params().iter().map(ExternType::ffi_type),
            signature.ret().ffi_type(),
        );
        let target = Box::into_raw(Box::new(HostFunction {
            name: name.to_string(),
            signature,
            func: Box::new(func),
        }));
        // SAFETY: target stays allocated until the trampoline is dropped, and
        // the closure is dropped first.
        let closure = Closure::new(cif, symbol_entry, unsafe { &*target });

        let id = self.allocate_id();
        let trampoline = Trampoline {
            id,
            kind: TrampolineKind::Symbol {
                closure: ManuallyDrop::new(closure),
                target,
            },
        };
        let ptr = trampoline.native_ptr();
        log::trace!("created trampoline {} for '{}' at {:p}", id, name, ptr);
        self.entries.insert(id, trampoline);
        Ok((id, ptr))
    }

    /// Create an error handler and record it
    ///
    /// Returns the id, the opaque pointer and the shim to hand to
    /// `tcc_set_error_func`.
    pub fn register_error_handler<F>(&mut self, func: F) -> (TrampolineId, *mut c_void, TCCErrorFunc)
    where
        F: FnMut(&str) + 'static,
    {
        let target = Box::into_raw(Box::new(ErrorHandler {
            func: RefCell::new(Box::new(func)),
        }));
        let id = self.allocate_id();
        self.entries.insert(
            id,
            Trampoline {
                id,
                kind: TrampolineKind::Error { target },
            },
        );
        log::trace!("created error handler {}", id);
        let shim: TCCErrorFunc = error_shim;
        (id, target as *mut c_void, shim)
    }

    /// Release one trampoline; `false` if the id is unknown or already released
    pub fn release(&mut self, id: TrampolineId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Release every trampoline, in creation order
    ///
    /// Idempotent: a second call finds nothing and returns 0.
    pub fn release_all(&mut self) -> usize {
        let released = self.entries.len();
        while let Some((_, trampoline)) = self.entries.pop_first() {
            drop(trampoline);
        }
        released
    }

    pub fn get(&self, id: TrampolineId) -> Option<&Trampoline> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TrampolineId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for TrampolineRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for TrampolineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}

/// Read one argument of the given kind from a libffi argument slot
unsafe fn read_arg(kind: ExternType, slot: *const c_void) -> CValue {
    match kind {
        ExternType::Void => CValue::Void,
        ExternType::I8 => CValue::I8(*(slot as *const i8)),
        ExternType::U8 => CValue::U8(*(slot as *const u8)),
        ExternType::I16 => CValue::I16(*(slot as *const i16)),
        ExternType::U16 => CValue::U16(*(slot as *const u16)),
        ExternType::I32 => CValue::I32(*(slot as *const i32)),
        ExternType::U32 => CValue::U32(*(slot as *const u32)),
        ExternType::I64 => CValue::I64(*(slot as *const i64)),
        ExternType::U64 => CValue::U64(*(slot as *const u64)),
        ExternType::F32 => CValue::F32(*(slot as *const f32)),
        ExternType::F64 => CValue::F64(*(slot as *const f64)),
        ExternType::Pointer => CValue::Pointer(*(slot as *const *mut c_void)),
    }
}

/// Store a return value into libffi's result slot
///
/// Integers narrower than `ffi_arg` must fill the whole slot.
unsafe fn write_return(slot: &mut ffi_arg, value: CValue) {
    let raw = slot as *mut ffi_arg;
    match value {
        CValue::Void => {}
        CValue::I8(v) => *slot = v as i64 as ffi_arg,
        CValue::U8(v) => *slot = v as ffi_arg,
        CValue::I16(v) => *slot = v as i64 as ffi_arg,
        CValue::U16(v) => *slot = v as ffi_arg,
        CValue::I32(v) => *slot = v as i64 as ffi_arg,
        CValue::U32(v) => *slot = v as ffi_arg,
        CValue::I64(v) => *(raw as *mut i64) = v,
        CValue::U64(v) => *(raw as *mut u64) = v,
        CValue::F32(v) => *(raw as *mut f32) = v,
        CValue::F64(v) => *(raw as *mut f64) = v,
        CValue::Pointer(p) => *(raw as *mut *mut c_void) = p,
    }
}

/// libffi entry point shared by every symbol trampoline
unsafe extern "C" fn symbol_entry(
    _cif: &ffi_cif,
    result: &mut ffi_arg,
    args: *const *const c_void,
    target: &HostFunction,
) {
    let params = target.signature.params();
    let values: Vec<CValue> = params
        .iter()
        .enumerate()
        .map(|(i, kind)| read_arg(*kind, *args.add(i)))
        .collect();

    let expected = target.signature.ret();
    let value = match catch_unwind(AssertUnwindSafe(|| (target.func)(&values))) {
        Ok(value) if value.kind() == expected => value,
        Ok(value) => {
            let coerced = value.cast_to(expected).unwrap_or_else(|| expected.zero());
            log::warn!(
                "host symbol '{}' returned {} where {} was declared; returning {:?}",
                target.name,
                value.kind(),
                expected,
                coerced
            );
            coerced
        }
        Err(_) => {
            log::error!(
                "host symbol '{}' panicked; returning zero {}",
                target.name,
                expected
            );
            expected.zero()
        }
    };

    write_return(result, value);
}

/// `TCCErrorFunc` shim shared by every error handler
unsafe extern "C" fn error_shim(opaque: *mut c_void, msg: *const c_char) {
    if opaque.is_null() {
        return;
    }
    let handler = &*(opaque as *const ErrorHandler);

    let message = match decode_lossy(msg) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("dropping compiler diagnostic: {}", e);
            return;
        }
    };

    let Ok(mut func) = handler.func.try_borrow_mut() else {
        log::warn!("error handler re-entered; dropping diagnostic: {}", message);
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| (*func)(&message))).is_err() {
        log::error!("error handler panicked while handling: {}", message);
    }
}
