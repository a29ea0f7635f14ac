//! String marshaling - host text ↔ null-terminated C buffers
//!
//! Every native call that takes text goes through [`encode`]; every native
//! call that hands text back (diagnostics delivered to the error callback)
//! goes through [`decode`]. The ABI encoding is UTF-8.
//!
//! # Memory Safety
//!
//! - Encoded buffers are owned `CString`s; callers keep them alive for the
//!   duration of the native call that borrows their pointer
//! - [`ArgvBuffer`] owns every argument string and the pointer array built
//!   over them, so the addresses it hands out never outlive the buffer

use std::ffi::{c_char, c_int, CStr, CString};
use thiserror::Error;

/// Marshal error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// Text contains a NUL byte, which would silently truncate it on the C side
    #[error("text contains an interior NUL byte at offset {position}")]
    InteriorNul { position: usize },

    /// Native bytes are not valid UTF-8
    #[error("native text is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Native side handed back a null pointer where text was expected
    #[error("null pointer where text was expected")]
    NullPointer,

    /// Too many arguments to express as a C `int` argc
    #[error("argument vector of {0} entries does not fit in a C int")]
    TooManyArguments(usize),
}

/// Encode host text as a null-terminated buffer
///
/// # Examples
///
/// ```
/// # use embedcc_runtime::ffi::marshal::encode;
/// let buf = encode("hello").unwrap();
/// assert_eq!(buf.as_bytes_with_nul(), b"hello\0");
/// ```
pub fn encode(text: &str) -> Result<CString, MarshalError> {
    CString::new(text).map_err(|e| MarshalError::InteriorNul {
        position: e.nul_position(),
    })
}

/// Decode a null-terminated native buffer into host text
///
/// # Safety
///
/// `ptr` must be null or point to a readable, null-terminated byte sequence
/// that stays valid for the duration of this call.
pub unsafe fn decode(ptr: *const c_char) -> Result<String, MarshalError> {
    if ptr.is_null() {
        return Err(MarshalError::NullPointer);
    }
    let c_str = CStr::from_ptr(ptr);
    c_str
        .to_str()
        .map(str::to_owned)
        .map_err(|e| MarshalError::InvalidUtf8(e.to_string()))
}

/// Lossy variant of [`decode`] for channels that have no caller to report to
///
/// # Safety
///
/// Same contract as [`decode`].
pub(crate) unsafe fn decode_lossy(ptr: *const c_char) -> Result<String, MarshalError> {
    match decode(ptr) {
        Err(MarshalError::InvalidUtf8(reason)) => {
            log::warn!("native diagnostic is not valid UTF-8 ({}), decoding lossily", reason);
            Ok(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
        other => other,
    }
}

/// Owned `argc`/`argv` pair for a single native call
///
/// The pointer array is null-terminated, as C `main` expects.
pub struct ArgvBuffer {
    /// Owned argument strings
    strings: Vec<CString>,
    /// Pointers into `strings`, plus the trailing null
    pointers: Vec<*mut c_char>,
}

impl ArgvBuffer {
    /// Encode every argument, rejecting the whole vector if any entry is invalid
    pub fn new<S: AsRef<str>>(args: &[S]) -> Result<Self, MarshalError> {
        if c_int::try_from(args.len()).is_err() {
            return Err(MarshalError::TooManyArguments(args.len()));
        }

        let strings = args
            .iter()
            .map(|arg| encode(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pointers: Vec<*mut c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut c_char)
            .collect();
        pointers.push(std::ptr::null_mut());

        Ok(Self { strings, pointers })
    }

    /// Argument count (excluding the trailing null)
    pub fn argc(&self) -> c_int {
        // Bounded by the check in `new`
        self.strings.len() as c_int
    }

    /// Pointer array for the native call; valid while `self` is borrowed
    pub fn argv(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
