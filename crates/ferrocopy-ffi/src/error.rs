//! FFI error handling
//!
//! Engine errors become a numeric code, a message and a JSON detail object.
//! Panics never unwind into the caller: every entry point that can reach
//! engine code runs under [`guard`].

use ferrocopy_types::{Error, ErrorCode};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use crate::types::{bool_to_c_int, FerrocopyResult};

impl FerrocopyResult {
    /// Result describing `error`
    pub fn from_error(error: &Error) -> Self {
        Self {
            error_code: error.code().as_i32(),
            error_message: crate::rust_string_to_c(error.to_string()),
            error_details: crate::rust_string_to_c(error_details(error)),
        }
    }
}

/// Key/value description of an error as a JSON object
pub(crate) fn error_details(error: &Error) -> String {
    let code = error.code();
    let mut details = serde_json::json!({
        "code": code.as_i32(),
        "kind": format!("{:?}", code),
        "description": code.description(),
        "severity": format!("{:?}", error.severity()),
        "recoverable": error.is_recoverable(),
    });
    if let Some(path) = error.path() {
        details["path"] = serde_json::Value::from(path.to_string_lossy().into_owned());
    }
    match error {
        Error::InsufficientSpace {
            required, available, ..
        } => {
            details["required"] = serde_json::Value::from(*required);
            details["available"] = serde_json::Value::from(*available);
        }
        Error::Timeout { seconds } => {
            details["seconds"] = serde_json::Value::from(*seconds);
        }
        _ => {}
    }
    details.to_string()
}

/// Store `outcome` in `out` (when non-null) and return its code.
///
/// # Safety
///
/// `out` must be null or point to writable memory for a `FerrocopyResult`.
pub(crate) unsafe fn write_result(out: *mut FerrocopyResult, outcome: Result<(), Error>) -> c_int {
    let result = match &outcome {
        Ok(()) => FerrocopyResult::empty(),
        Err(e) => FerrocopyResult::from_error(e),
    };
    let code = result.error_code;
    if out.is_null() {
        crate::release_result(result);
    } else {
        out.write(result);
    }
    code
}

/// Run `f`, turning a panic into a generic error.
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("Panic caught at the FFI boundary");
        Err(Error::generic("internal panic"))
    })
}

fn description(error_code: c_int) -> &'static [u8] {
    match ErrorCode::from_i32(error_code) {
        Some(ErrorCode::Success) => b"Success\0",
        Some(ErrorCode::Generic) => b"Generic error\0",
        Some(ErrorCode::FileNotFound) => b"File not found\0",
        Some(ErrorCode::PermissionDenied) => b"Permission denied\0",
        Some(ErrorCode::InsufficientSpace) => b"Insufficient disk space\0",
        Some(ErrorCode::InvalidPath) => b"Invalid path\0",
        Some(ErrorCode::Network) => b"Network error\0",
        Some(ErrorCode::Compression) => b"Compression error\0",
        Some(ErrorCode::Verification) => b"Verification failed\0",
        Some(ErrorCode::Cancelled) => b"Operation cancelled\0",
        Some(ErrorCode::InvalidArgument) => b"Invalid argument\0",
        Some(ErrorCode::OutOfMemory) => b"Out of memory\0",
        Some(ErrorCode::Timeout) => b"Operation timed out\0",
        None => b"Unknown error\0",
    }
}

/// Get error code description
///
/// The returned string is static and must not be freed.
#[no_mangle]
pub extern "C" fn ferrocopy_error_code_description(error_code: c_int) -> *const c_char {
    description(error_code).as_ptr().cast()
}

/// Check if an error code represents success
#[no_mangle]
pub extern "C" fn ferrocopy_is_success(error_code: c_int) -> c_int {
    bool_to_c_int(error_code == ErrorCode::Success.as_i32())
}

/// Check if an error code represents an error worth retrying
#[no_mangle]
pub extern "C" fn ferrocopy_is_recoverable_error(error_code: c_int) -> c_int {
    let recoverable = matches!(
        ErrorCode::from_i32(error_code),
        Some(ErrorCode::Network | ErrorCode::Timeout | ErrorCode::InsufficientSpace)
    );
    bool_to_c_int(recoverable)
}
