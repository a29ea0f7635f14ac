//! Calling native functions resolved from a compiled unit
//!
//! A resolved symbol is just an address; [`NativeFunction`] pairs it with a
//! caller-declared [`Signature`] and a prepared libffi call interface so any
//! signature over the primitive kinds can be invoked without per-signature
//! glue.

use crate::ffi::types::{CValue, ExternType, Signature};
use libffi::low::ffi_arg;
use libffi::middle::{arg, Arg, Cif, CodePtr};
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// FFI call errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Wrong number of arguments
    #[error("expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// Argument kind differs from the declared parameter kind
    #[error("argument {index}: expected {expected}, got {got}")]
    ArgumentMismatch {
        index: usize,
        expected: ExternType,
        got: ExternType,
    },

    /// Signature cannot be expressed as a C function type
    #[error("unsupported FFI signature: {0}")]
    UnsupportedSignature(String),
}

/// A function pointer from compiled code, callable with host values
///
/// Borrows the [`Context`](crate::Context) it was resolved from: the code it
/// points into is released when that context is torn down.
pub struct NativeFunction<'ctx> {
    /// Raw function pointer (type-erased)
    ptr: *mut c_void,
    signature: Signature,
    cif: Cif,
    _context: PhantomData<&'ctx ()>,
}

impl<'ctx> NativeFunction<'ctx> {
    /// Wrap a raw function pointer with its declared signature
    ///
    /// # Safety
    ///
    /// `ptr` must point to a function that stays valid for `'ctx`.
    pub(crate) unsafe fn new(ptr: *mut c_void, signature: Signature) -> Result<Self, CallError> {
        if let Some(index) = signature.void_param() {
            return Err(CallError::UnsupportedSignature(format!(
                "{} (parameter {} is void)",
                signature, index
            )));
        }
        let cif = Cif::new(
            signature.params().iter().map(ExternType::ffi_type),
            signature.ret().ffi_type(),
        );
        Ok(Self {
            ptr,
            signature,
            cif,
            _context: PhantomData,
        })
    }

    /// Call the function with host values
    ///
    /// Arity and argument kinds are checked against the declared signature.
    ///
    /// # Safety
    ///
    /// The declared signature must match the function's real C signature.
    /// A mismatch is undefined behavior at the ABI boundary; nothing here can
    /// detect it.
    pub unsafe fn call(&self, args: &[CValue]) -> Result<CValue, CallError> {
        let params = self.signature.params();
        if args.len() != params.len() {
            return Err(CallError::ArityMismatch {
                expected: params.len(),
                got: args.len(),
            });
        }
        for (index, (value, expected)) in args.iter().zip(params).enumerate() {
            if value.kind() != *expected {
                return Err(CallError::ArgumentMismatch {
                    index,
                    expected: *expected,
                    got: value.kind(),
                });
            }
        }

        let ffi_args: Vec<Arg> = args.iter().map(arg_of).collect();
        let code = CodePtr::from_ptr(self.ptr as *const c_void);

        let ret = self.signature.ret();
        let value = if ret.is_narrow_integer() {
            // libffi widens narrow integer returns to a full ffi_arg
            let raw = self.cif.call::<ffi_arg>(code, &ffi_args);
            CValue::I64(raw as i64)
                .cast_to(ret)
                .unwrap_or_else(|| ret.zero())
        } else {
            match ret {
                ExternType::Void => {
                    self.cif.call::<()>(code, &ffi_args);
                    CValue::Void
                }
                ExternType::I64 => CValue::I64(self.cif.call::<i64>(code, &ffi_args)),
                ExternType::U64 => CValue::U64(self.cif.call::<u64>(code, &ffi_args)),
                ExternType::F32 => CValue::F32(self.cif.call::<f32>(code, &ffi_args)),
                ExternType::F64 => CValue::F64(self.cif.call::<f64>(code, &ffi_args)),
                ExternType::Pointer => {
                    CValue::Pointer(self.cif.call::<*mut c_void>(code, &ffi_args))
                }
                _ => unreachable!("narrow integers handled above"),
            }
        };
        Ok(value)
    }

    /// The raw address
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for NativeFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("ptr", &self.ptr)
            .field("signature", &self.signature.to_string())
            .finish()
    }
}

fn arg_of(value: &CValue) -> Arg {
    match value {
        CValue::Void => arg(&()),
        CValue::I8(v) => arg(v),
        CValue::U8(v) => arg(v),
        CValue::I16(v) => arg(v),
        CValue::U16(v) => arg(v),
        CValue::I32(v) => arg(v),
        CValue::U32(v) => arg(v),
        CValue::I64(v) => arg(v),
        CValue::U64(v) => arg(v),
        CValue::F32(v) => arg(v),
        CValue::F64(v) => arg(v),
        CValue::Pointer(p) => arg(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    extern "C" fn test_add(a: i32, b: i32) -> i32 {
        a + b
    }

    extern "C" fn test_scale(x: f64, factor: f32) -> f64 {
        x * factor as f64
    }

    extern "C" fn test_negate_byte(x: i8) -> i8 {
        x.wrapping_neg()
    }

    extern "C" fn test_no_args() -> i64 {
        1 << 40
    }

    extern "C" fn test_identity_ptr(p: *mut c_void) -> *mut c_void {
        p
    }

    fn native(ptr: *const (), params: Vec<ExternType>, ret: ExternType) -> NativeFunction<'static> {
        unsafe { NativeFunction::new(ptr as *mut c_void, Signature::new(params, ret)).unwrap() }
    }

    #[test]
    fn test_call_int_add() {
        let func = native(
            test_add as *const (),
            vec![ExternType::I32, ExternType::I32],
            ExternType::I32,
        );
        let result = unsafe { func.call(&[CValue::I32(10), CValue::I32(20)]) };
        assert_eq!(result, Ok(CValue::I32(30)));
    }

    #[test]
    fn test_call_mixed_floats() {
        let func = native(
            test_scale as *const (),
            vec![ExternType::F64, ExternType::F32],
            ExternType::F64,
        );
        let result = unsafe { func.call(&[CValue::F64(2.5), CValue::F32(4.0)]) };
        assert_eq!(result, Ok(CValue::F64(10.0)));
    }

    #[test]
    fn test_call_narrow_return_keeps_sign() {
        let func = native(test_negate_byte as *const (), vec![ExternType::I8], ExternType::I8);
        let result = unsafe { func.call(&[CValue::I8(5)]) };
        assert_eq!(result, Ok(CValue::I8(-5)));
    }

    #[test]
    fn test_call_no_args() {
        let func = native(test_no_args as *const (), vec![], ExternType::I64);
        assert_eq!(unsafe { func.call(&[]) }, Ok(CValue::I64(1 << 40)));
    }

    #[test]
    fn test_call_pointer_round_trip() {
        let func = native(
            test_identity_ptr as *const (),
            vec![ExternType::Pointer],
            ExternType::Pointer,
        );
        let p = 0xdead_0000usize as *mut c_void;
        assert_eq!(unsafe { func.call(&[CValue::Pointer(p)]) }, Ok(CValue::Pointer(p)));
    }

    #[rstest]
    #[case(vec![CValue::I32(1)], CallError::ArityMismatch { expected: 2, got: 1 })]
    #[case(
        vec![CValue::I32(1), CValue::I64(2)],
        CallError::ArgumentMismatch { index: 1, expected: ExternType::I32, got: ExternType::I64 }
    )]
    fn test_call_rejects_bad_arguments(#[case] args: Vec<CValue>, #[case] expected: CallError) {
        let func = native(
            test_add as *const (),
            vec![ExternType::I32, ExternType::I32],
            ExternType::I32,
        );
        assert_eq!(unsafe { func.call(&args) }, Err(expected));
    }

    #[test]
    fn test_void_parameter_rejected() {
        let result = unsafe {
            NativeFunction::new(
                test_add as *const () as *mut c_void,
                Signature::new(vec![ExternType::Void], ExternType::I32),
            )
        };
        assert!(matches!(result, Err(CallError::UnsupportedSignature(_))));
    }
}
