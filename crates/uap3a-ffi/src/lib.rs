//! C ABI artifact for `uap3a`.
//!
//! Builds the `agora_ap_*` functions into a static and a dynamic library.
//! The matching header is generated into `include/uap3a.h`.
//!
//! Rust callers can swap the engine behind the C API with
//! [`set_engine_factory`] before creating processors.

pub use uap3a::ffi::functions::*;
pub use uap3a::ffi::types::*;
pub use uap3a::ffi::{EngineFactory, set_engine_factory};
