//! FFI type system - C-compatible kinds and values for the symbol channel
//!
//! Defines:
//! - `ExternType`: the primitive ABI kinds a signature is built from
//! - `CValue`: runtime representation of a value of one of those kinds
//! - `Signature`: ordered parameter kinds plus a return kind
//!
//! Type mapping:
//! - ExternType::I8 .. ExternType::U64 → CValue::I8(i8) .. CValue::U64(u64)
//! - ExternType::F32 / ExternType::F64 → CValue::F32(f32) / CValue::F64(f64)
//! - ExternType::Pointer → CValue::Pointer(*mut c_void)
//! - ExternType::Void → CValue::Void (return position only)

use libffi::middle::Type;
use std::ffi::c_void;
use std::fmt;

/// Primitive C kinds that can cross the symbol channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// C void (return position only)
    Void,
    I8,
    U8,
    I16,
    U16,
    /// C int on every platform libtcc targets
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Any data or function pointer
    Pointer,
}

impl ExternType {
    /// Display name used in diagnostics and signature keys
    pub fn display_name(&self) -> &'static str {
        match self {
            ExternType::Void => "void",
            ExternType::I8 => "i8",
            ExternType::U8 => "u8",
            ExternType::I16 => "i16",
            ExternType::U16 => "u16",
            ExternType::I32 => "i32",
            ExternType::U32 => "u32",
            ExternType::I64 => "i64",
            ExternType::U64 => "u64",
            ExternType::F32 => "f32",
            ExternType::F64 => "f64",
            ExternType::Pointer => "pointer",
        }
    }

    /// libffi type descriptor for this kind
    pub(crate) fn ffi_type(&self) -> Type {
        match self {
            ExternType::Void => Type::void(),
            ExternType::I8 => Type::i8(),
            ExternType::U8 => Type::u8(),
            ExternType::I16 => Type::i16(),
            ExternType::U16 => Type::u16(),
            ExternType::I32 => Type::i32(),
            ExternType::U32 => Type::u32(),
            ExternType::I64 => Type::i64(),
            ExternType::U64 => Type::u64(),
            ExternType::F32 => Type::f32(),
            ExternType::F64 => Type::f64(),
            ExternType::Pointer => Type::pointer(),
        }
    }

    /// Integer kinds narrower than the ABI return register are widened by libffi
    pub(crate) fn is_narrow_integer(&self) -> bool {
        matches!(
            self,
            ExternType::I8
                | ExternType::U8
                | ExternType::I16
                | ExternType::U16
                | ExternType::I32
                | ExternType::U32
        )
    }

    /// The zero value of this kind, used when a host callback misbehaves
    pub fn zero(&self) -> CValue {
        match self {
            ExternType::Void => CValue::Void,
            ExternType::I8 => CValue::I8(0),
            ExternType::U8 => CValue::U8(0),
            ExternType::I16 => CValue::I16(0),
            ExternType::U16 => CValue::U16(0),
            ExternType::I32 => CValue::I32(0),
            ExternType::U32 => CValue::U32(0),
            ExternType::I64 => CValue::I64(0),
            ExternType::U64 => CValue::U64(0),
            ExternType::F32 => CValue::F32(0.0),
            ExternType::F64 => CValue::F64(0.0),
            ExternType::Pointer => CValue::Pointer(std::ptr::null_mut()),
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A value crossing the FFI boundary
///
/// # Safety
///
/// `Pointer` carries a raw address; nothing about its validity is tracked here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CValue {
    Void,
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Pointer(*mut c_void),
}

impl CValue {
    /// The kind of this value
    pub fn kind(&self) -> ExternType {
        match self {
            CValue::Void => ExternType::Void,
            CValue::I8(_) => ExternType::I8,
            CValue::U8(_) => ExternType::U8,
            CValue::I16(_) => ExternType::I16,
            CValue::U16(_) => ExternType::U16,
            CValue::I32(_) => ExternType::I32,
            CValue::U32(_) => ExternType::U32,
            CValue::I64(_) => ExternType::I64,
            CValue::U64(_) => ExternType::U64,
            CValue::F32(_) => ExternType::F32,
            CValue::F64(_) => ExternType::F64,
            CValue::Pointer(_) => ExternType::Pointer,
        }
    }

    /// Integer view of any integral value
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            CValue::I8(v) => Some(v as i64),
            CValue::U8(v) => Some(v as i64),
            CValue::I16(v) => Some(v as i64),
            CValue::U16(v) => Some(v as i64),
            CValue::I32(v) => Some(v as i64),
            CValue::U32(v) => Some(v as i64),
            CValue::I64(v) => Some(v),
            CValue::U64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            CValue::F32(v) => Some(v as f64),
            CValue::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<*mut c_void> {
        match *self {
            CValue::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Convert between integer kinds or between float kinds, `as`-style
    ///
    /// Returns `None` across families (integer, float, pointer, void).
    pub fn cast_to(&self, kind: ExternType) -> Option<CValue> {
        if self.kind() == kind {
            return Some(*self);
        }
        if let Some(v) = self.as_i64() {
            return match kind {
                ExternType::I8 => Some(CValue::I8(v as i8)),
                ExternType::U8 => Some(CValue::U8(v as u8)),
                ExternType::I16 => Some(CValue::I16(v as i16)),
                ExternType::U16 => Some(CValue::U16(v as u16)),
                ExternType::I32 => Some(CValue::I32(v as i32)),
                ExternType::U32 => Some(CValue::U32(v as u32)),
                ExternType::I64 => Some(CValue::I64(v)),
                ExternType::U64 => Some(CValue::U64(v as u64)),
                _ => None,
            };
        }
        if let Some(v) = self.as_f64() {
            return match kind {
                ExternType::F32 => Some(CValue::F32(v as f32)),
                ExternType::F64 => Some(CValue::F64(v)),
                _ => None,
            };
        }
        None
    }
}

impl From<i32> for CValue {
    fn from(v: i32) -> Self {
        CValue::I32(v)
    }
}

impl From<i64> for CValue {
    fn from(v: i64) -> Self {
        CValue::I64(v)
    }
}

impl From<f64> for CValue {
    fn from(v: f64) -> Self {
        CValue::F64(v)
    }
}

impl From<()> for CValue {
    fn from(_: ()) -> Self {
        CValue::Void
    }
}

/// Calling signature of a function crossing the boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<ExternType>,
    ret: ExternType,
}

impl Signature {
    pub fn new(params: Vec<ExternType>, ret: ExternType) -> Self {
        Self { params, ret }
    }

    pub fn params(&self) -> &[ExternType] {
        &self.params
    }

    pub fn ret(&self) -> ExternType {
        self.ret
    }

    /// `Void` is only meaningful as a return kind
    pub(crate) fn void_param(&self) -> Option<usize> {
        self.params.iter().position(|p| *p == ExternType::Void)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|t| t.display_name())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "({})->{}", params, self.ret)
    }
}
