//! Error types for compiler context operations

use crate::context::{ContextState, OutputType};
use crate::ffi::{CallError, CallbackError, LoadError, MarshalError};
use thiserror::Error;

/// Errors raised by [`Context`](crate::Context) operations
///
/// None of these poison the context: after any error except
/// `UseAfterTeardown` the context is still usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The native layer reported failure (negative return or null handle)
    #[error("{operation} failed in the compiler (code {code})")]
    NativeCallFailure { operation: &'static str, code: i32 },

    /// Text could not be converted to or from the native representation
    #[error("invalid text for the compiler: {0}")]
    InvalidEncoding(#[from] MarshalError),

    /// Symbol lookup before the code was relocated into memory
    #[error("cannot resolve '{name}' before the code is relocated")]
    SymbolUnresolved { name: String },

    /// Operation on a context that was already deleted
    #[error("{operation} called on a deleted compiler context")]
    UseAfterTeardown { operation: &'static str },

    /// Operation not permitted in the current lifecycle state
    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ContextState,
    },

    /// Operation requires a different output type
    #[error("{operation} is not available when compiling to {output_type}")]
    OutputMismatch {
        operation: &'static str,
        output_type: OutputType,
    },

    /// The output type was already applied to the native handle
    #[error("output type is already set to {output_type}")]
    OutputTypeFixed { output_type: OutputType },

    /// A host callback could not be turned into a native trampoline
    #[error(transparent)]
    Trampoline(#[from] CallbackError),

    /// A resolved symbol cannot be wrapped with the requested signature
    #[error(transparent)]
    Call(#[from] CallError),

    /// The compiler library could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result alias for context operations
pub type ContextResult<T> = Result<T, ContextError>;
