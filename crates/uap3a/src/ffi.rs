//! C-compatible FFI layer.
//!
//! Exposes `extern "C"` functions and `#[repr(C)]` types so C and C++
//! callers can drive processors through opaque handles.
//!
//! # Symbol prefix
//!
//! - Functions: `agora_ap_*`
//! - Types: `Ap*`
//!
//! # Return codes
//!
//! `0` is success. `-1` is a null or invalid argument, `-2` a released or
//! uninitialized handle, `-3` an invalid audio frame, `-4` an unknown
//! reference mode and `-99` a panic caught at the boundary. Any other value
//! comes from the engine unchanged.
//!
//! # Thread safety
//!
//! **NOT thread-safe per handle.** Calls on the same [`ApProcessor`]
//! must be serialized by the caller, and no API function may be called from
//! inside an event callback.
//!
//! [`ApProcessor`]: types::ApProcessor

pub mod types;

mod bridge;
mod conversions;
pub mod functions;
mod panic_guard;
mod registry;

pub use registry::{EngineFactory, set_engine_factory};
