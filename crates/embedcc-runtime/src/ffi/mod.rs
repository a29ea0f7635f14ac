//! Foreign Function Interface (FFI) infrastructure
//!
//! Everything that touches the libtcc C ABI lives here:
//! - Type marshaling (host values ↔ C kinds, text ↔ C strings)
//! - Dynamic library loading and the native binding table
//! - Calls into compiled code through libffi call interfaces
//! - Callbacks from compiled code (and the compiler) into host closures
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful memory management.
//! All unsafe code is isolated in this module; [`Context`](crate::Context)
//! is the safe wrapper built on top of it.

pub mod bindings;
pub mod callbacks;
pub mod caller;
pub mod loader;
pub mod marshal;
pub mod types;

pub use bindings::{BindingTable, TCCErrorFunc, TCCState, TCC_RELOCATE_AUTO};
pub use callbacks::{CallbackError, Trampoline, TrampolineId, TrampolineRegistry};
pub use caller::{CallError, NativeFunction};
pub use loader::{LibraryLoader, LoadError};
pub use marshal::{decode, encode, ArgvBuffer, MarshalError};
pub use types::{CValue, ExternType, Signature};
