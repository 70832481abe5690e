//! FFI callback support
//!
//! [`CallbackContext`] adapts C function pointers to the engine's
//! [`ProgressReporter`]. The engine invokes it from a single dispatcher task,
//! never from a worker, so a slow callback delays event delivery but not the
//! copy itself. Strings passed to a callback are only valid for the duration
//! of that call.

use ferrocopy_types::{ErrorRecord, ProgressEvent, ProgressReporter};
use std::ffi::CString;
use std::os::raw::{c_ulonglong, c_void};
use std::path::Path;
use std::ptr;

use crate::types::{ErrorCallback, ProgressCallback};

/// Callback functions plus the caller's opaque context pointer
#[derive(Debug)]
pub struct CallbackContext {
    progress_callback: Option<ProgressCallback>,
    error_callback: Option<ErrorCallback>,
    user_data: *mut c_void,
}

// The pointer is handed back to the caller untouched; the caller vouches for
// its thread safety by registering it.
unsafe impl Send for CallbackContext {}
unsafe impl Sync for CallbackContext {}

impl CallbackContext {
    /// Create a new callback context
    pub const fn new(
        progress_callback: Option<ProgressCallback>,
        error_callback: Option<ErrorCallback>,
        user_data: *mut c_void,
    ) -> Self {
        Self {
            progress_callback,
            error_callback,
            user_data,
        }
    }

    /// Whether any callback is registered
    pub const fn is_empty(&self) -> bool {
        self.progress_callback.is_none() && self.error_callback.is_none()
    }
}

fn path_to_c(path: &Path) -> Option<CString> {
    if path.as_os_str().is_empty() {
        return None;
    }
    CString::new(path.to_string_lossy().into_owned()).ok()
}

impl ProgressReporter for CallbackContext {
    fn report_progress(&self, event: &ProgressEvent) {
        let Some(callback) = self.progress_callback else {
            return;
        };
        let file = path_to_c(&event.current_file);
        callback(
            event.percent,
            event.bytes_copied as c_ulonglong,
            event.total_bytes as c_ulonglong,
            file.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
            self.user_data,
        );
    }

    fn report_error(&self, record: &ErrorRecord) {
        let Some(callback) = self.error_callback else {
            return;
        };
        let message = CString::new(record.message.replace('\0', " ")).unwrap_or_default();
        let file = record.path.as_deref().and_then(path_to_c);
        callback(
            record.code.as_i32(),
            message.as_ptr(),
            file.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
            self.user_data,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocopy_types::{Error, ErrorCode};
    use std::ffi::CStr;
    use std::os::raw::{c_char, c_int};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Seen {
        progress: Vec<(f64, u64, u64, Option<String>)>,
        errors: Vec<(c_int, String, Option<String>)>,
    }

    unsafe fn opt_string(ptr: *const c_char) -> Option<String> {
        (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }

    extern "C" fn on_progress(
        percent: f64,
        bytes: c_ulonglong,
        total: c_ulonglong,
        file: *const c_char,
        user_data: *mut c_void,
    ) {
        let seen = unsafe { &*(user_data as *const Mutex<Seen>) };
        let file = unsafe { opt_string(file) };
        seen.lock().unwrap().progress.push((percent, bytes, total, file));
    }

    extern "C" fn on_error(code: c_int, message: *const c_char, file: *const c_char, user_data: *mut c_void) {
        let seen = unsafe { &*(user_data as *const Mutex<Seen>) };
        let message = unsafe { opt_string(message) }.unwrap_or_default();
        let file = unsafe { opt_string(file) };
        seen.lock().unwrap().errors.push((code, message, file));
    }

    #[test]
    fn test_callbacks_receive_user_data() {
        let seen = Mutex::new(Seen::default());
        let context = CallbackContext::new(
            Some(on_progress),
            Some(on_error),
            &seen as *const Mutex<Seen> as *mut c_void,
        );
        assert!(!context.is_empty());

        context.report_progress(&ProgressEvent::new(512, 2048, "dir/example.txt"));
        context.report_error(&ErrorRecord::from_error(
            &Error::FileNotFound {
                path: "missing.txt".into(),
            },
            None,
        ));

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.progress.len(), 1);
        let (percent, bytes, total, file) = &seen.progress[0];
        assert_eq!(*percent, 25.0);
        assert_eq!((*bytes, *total), (512, 2048));
        assert_eq!(file.as_deref(), Some("dir/example.txt"));

        let (code, message, file) = &seen.errors[0];
        assert_eq!(*code, ErrorCode::FileNotFound.as_i32());
        assert!(!message.is_empty());
        assert_eq!(file.as_deref(), Some("missing.txt"));
    }

    #[test]
    fn test_missing_callbacks_are_skipped() {
        let context = CallbackContext::new(None, None, ptr::null_mut());
        assert!(context.is_empty());
        context.report_progress(&ProgressEvent::new(1, 1, ""));
        context.report_error(&ErrorRecord::from_error(&Error::Cancelled, None));
    }
}
