//! embedcc Runtime - embed the Tiny C Compiler in a Rust process
//!
//! This library wraps a dynamically loaded libtcc:
//! - Loading the library once per process and resolving its entry points
//! - Marshaling text, numbers and host closures across the C ABI
//! - A compiler [`Context`] that enforces libtcc's call ordering and owns
//!   every native resource created for it
//! - Calling compiled functions, and letting compiled code call back into Rust

/// embedcc runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builder;
pub mod context;
pub mod error;
pub mod ffi;

// Re-export commonly used types
pub use builder::{BuildError, ContextBuilder, ContextOptions};
pub use context::{
    Context, ContextState, ImageBuffer, OutputType, ParseOutputTypeError, RelocateMode,
};
pub use error::{ContextError, ContextResult};
pub use ffi::{
    BindingTable, CValue, CallError, CallbackError, ExternType, LibraryLoader, LoadError,
    MarshalError, NativeFunction, Signature, TrampolineId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
