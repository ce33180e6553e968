//! Panic guards for `extern "C"` bodies.
//!
//! Unwinding across the C boundary is undefined behaviour, so every exported
//! function runs its body under `catch_unwind`.

use std::ffi::c_int;

/// Status returned when a panic is caught.
pub(crate) const PANIC_STATUS: c_int = -99;

/// Wraps a body returning a `c_int` status; a panic yields [`PANIC_STATUS`].
macro_rules! ffi_guard {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("panic caught at the C boundary");
                $crate::ffi::panic_guard::PANIC_STATUS
            }
        }
    }};
}

/// Wraps a body returning a raw pointer; a panic yields null.
macro_rules! ffi_guard_ptr {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;
        use std::ptr;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("panic caught at the C boundary");
                ptr::null_mut()
            }
        }
    }};
}

/// Wraps a body returning nothing; a panic is logged and swallowed.
macro_rules! ffi_guard_void {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;

        if panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })).is_err() {
            tracing::error!("panic caught at the C boundary");
        }
    }};
}

pub(crate) use ffi_guard;
pub(crate) use ffi_guard_ptr;
pub(crate) use ffi_guard_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffi_guard_passes_status_through() {
        let status: c_int = ffi_guard! { -7 };
        assert_eq!(status, -7);
    }

    #[test]
    fn ffi_guard_maps_panic_to_status() {
        let status: c_int = ffi_guard! {
            panic!("test panic");
        };
        assert_eq!(status, PANIC_STATUS);
    }

    #[test]
    fn ffi_guard_ptr_returns_null_on_panic() {
        let ptr: *mut u8 = ffi_guard_ptr! {
            panic!("test panic");
        };
        assert!(ptr.is_null());
    }

    #[test]
    fn ffi_guard_void_swallows_panic() {
        ffi_guard_void! {
            panic!("test panic");
        }
    }
}
