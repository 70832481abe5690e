//! C-compatible FFI interface for ferrocopy
//!
//! This crate exposes the copy engine through a C ABI so that C, C++,
//! Python (ctypes/cffi) and other languages can drive it.
//!
//! # Design Principles
//!
//! 1. **C-ABI Compatibility**: all public functions use C calling conventions
//! 2. **Opaque handles**: engines and operations are 64-bit ids, never pointers
//! 3. **Explicit ownership**: every string the library returns is released
//!    by the caller through a `ferrocopy_free_*` call
//! 4. **Error Handling**: numeric error codes plus a message and JSON details
//!
//! # Lifecycle
//!
//! ```text
//! ferrocopy_init()
//!   └─ ferrocopy_engine_create() ──► handle
//!        ├─ ferrocopy_copy / ferrocopy_copy_with_progress   (blocking)
//!        ├─ ferrocopy_submit ─► op ─► ferrocopy_cancel / ferrocopy_wait
//!        └─ ferrocopy_engine_destroy(handle)
//! ferrocopy_cleanup()
//! ```
//!
//! `ferrocopy_init` may be called again after `ferrocopy_cleanup`.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrocopy_types::Result;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::ptr;

pub mod callbacks;
pub mod engine;
pub mod error;
pub mod types;

pub use callbacks::*;
pub use engine::*;
pub use error::*;
pub use types::*;

/// Initialize the ferrocopy library
///
/// Must be called before any engine function. Starts the async runtime and
/// installs a `tracing` subscriber filtered by `FERROCOPY_LOG` unless the
/// host already installed one. Calling it again while initialized is a no-op.
///
/// # Returns
///
/// 0 on success, non-zero error code on failure.
#[no_mangle]
pub extern "C" fn ferrocopy_init() -> c_int {
    init_logging();
    match error::guard(engine::initialize) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Failed to initialize ferrocopy: {}", e);
            e.code().as_i32()
        }
    }
}

/// Cleanup the ferrocopy library
///
/// Destroys every remaining engine, cancelling its operations, and stops the
/// runtime.
#[no_mangle]
pub extern "C" fn ferrocopy_cleanup() {
    let _ = error::guard(|| {
        engine::cleanup();
        Ok(())
    });
}

/// Get library version
///
/// The returned string is statically allocated and must not be freed.
#[no_mangle]
pub extern "C" fn ferrocopy_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast()
}

/// Free a string allocated by ferrocopy
///
/// # Safety
///
/// The pointer must have been returned by a ferrocopy function and not
/// already freed.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Free the strings held by a `FerrocopyResult`
///
/// The structure itself belongs to the caller; its pointers are reset to null.
///
/// # Safety
///
/// The result must have been filled by a ferrocopy function.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_free_result(result: *mut FerrocopyResult) {
    if let Some(result) = result.as_mut() {
        ferrocopy_free_string(result.error_message);
        result.error_message = ptr::null_mut();
        ferrocopy_free_string(result.error_details);
        result.error_details = ptr::null_mut();
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("FERROCOPY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // The host may have installed its own subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Release a result that never reached the caller
pub(crate) fn release_result(mut result: FerrocopyResult) {
    unsafe { ferrocopy_free_result(&mut result) };
}

/// Convert Rust string to C string
///
/// Interior NUL bytes are replaced. The returned pointer must be freed with
/// `ferrocopy_free_string`.
pub(crate) fn rust_string_to_c(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', " ") } else { s };
    CString::new(s).map_or(ptr::null_mut(), CString::into_raw)
}

/// Convert a C string to a path; null becomes the empty path.
///
/// # Safety
///
/// The pointer must be null or a valid null-terminated C string.
pub(crate) unsafe fn c_string_to_path(ptr: *const c_char) -> Result<PathBuf> {
    if ptr.is_null() {
        return Ok(PathBuf::new());
    }
    let bytes = CStr::from_ptr(ptr).to_bytes();

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
    }
    #[cfg(not(unix))]
    {
        std::str::from_utf8(bytes)
            .map(PathBuf::from)
            .map_err(|_| {
                ferrocopy_types::Error::invalid_path(
                    String::from_utf8_lossy(bytes).into_owned(),
                    "path is not valid UTF-8",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(ferrocopy_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_string_conversion() {
        let c_str = rust_string_to_c("Hello, World!".to_string());
        assert!(!c_str.is_null());

        let converted_back = unsafe { c_string_to_path(c_str) }.unwrap();
        assert_eq!(converted_back, PathBuf::from("Hello, World!"));

        unsafe { ferrocopy_free_string(c_str) };
    }

    #[test]
    fn test_interior_nul_is_replaced() {
        let c_str = rust_string_to_c("a\0b".to_string());
        let back = unsafe { CStr::from_ptr(c_str) }.to_str().unwrap().to_string();
        assert_eq!(back, "a b");
        unsafe { ferrocopy_free_string(c_str) };
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe {
            ferrocopy_free_string(ptr::null_mut());
            ferrocopy_free_result(ptr::null_mut());
        }
    }
}
