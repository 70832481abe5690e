//! Exercises the C ABI the way a C caller would.

use ferrocopy_ffi::*;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_ulonglong, c_void};
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

// Library state is process-wide; run one scenario at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Paths {
    source: CString,
    destination: CString,
}

impl Paths {
    fn new(source: &std::path::Path, destination: &std::path::Path) -> Self {
        Self {
            source: CString::new(source.to_str().unwrap()).unwrap(),
            destination: CString::new(destination.to_str().unwrap()).unwrap(),
        }
    }

    fn request(&self, mode: c_int) -> FerrocopyCopyRequest {
        FerrocopyCopyRequest {
            source: self.source.as_ptr(),
            destination: self.destination.as_ptr(),
            mode,
            compress: 0,
            preserve_metadata: 0,
            verify_copy: 1,
            threads: 0,
            buffer_size: 0,
        }
    }
}

#[test]
fn test_engine_lifecycle_and_reinit() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);
    assert_eq!(ferrocopy_init(), 0);

    let handle = ferrocopy_engine_create();
    assert_ne!(handle, 0);
    ferrocopy_engine_destroy(handle);
    ferrocopy_engine_destroy(handle);

    // stale handle
    let temp_dir = TempDir::new().unwrap();
    let paths = Paths::new(&temp_dir.path().join("a"), &temp_dir.path().join("b"));
    let mut result = FerrocopyResult::empty();
    let code = unsafe { ferrocopy_copy(handle, &paths.request(0), ptr::null_mut(), &mut result) };
    assert_eq!(code, FerrocopyErrorCode::InvalidArgument as c_int);
    unsafe { ferrocopy_free_result(&mut result) };

    ferrocopy_cleanup();
    assert_eq!(ferrocopy_engine_create(), 0);

    assert_eq!(ferrocopy_init(), 0);
    let handle = ferrocopy_engine_create();
    assert_ne!(handle, 0);
    ferrocopy_engine_destroy(handle);
    ferrocopy_cleanup();
}

#[test]
fn test_copy_file() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);
    let handle = ferrocopy_engine_create();

    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source.bin");
    let destination = temp_dir.path().join("destination.bin");
    std::fs::write(&source, vec![7u8; 10_000]).unwrap();
    let paths = Paths::new(&source, &destination);

    let mut stats = FerrocopyStats::default();
    let mut result = FerrocopyResult::empty();
    let code = unsafe { ferrocopy_copy(handle, &paths.request(0), &mut stats, &mut result) };

    assert_eq!(code, 0);
    assert_eq!(ferrocopy_is_success(code), 1);
    assert!(result.error_message.is_null());
    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.bytes_copied, 10_000);
    assert!(stats.efficiency_percent >= 0.0 && stats.efficiency_percent <= 100.0);
    assert_eq!(std::fs::read(&destination).unwrap(), vec![7u8; 10_000]);

    unsafe { ferrocopy_free_result(&mut result) };
    ferrocopy_engine_destroy(handle);
    ferrocopy_cleanup();
}

#[test]
fn test_empty_source_is_invalid_path() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);
    let handle = ferrocopy_engine_create();

    let temp_dir = TempDir::new().unwrap();
    let destination = CString::new(temp_dir.path().to_str().unwrap()).unwrap();
    let empty = CString::default();
    let request = FerrocopyCopyRequest {
        source: empty.as_ptr(),
        destination: destination.as_ptr(),
        mode: 0,
        compress: 0,
        preserve_metadata: 0,
        verify_copy: 0,
        threads: 0,
        buffer_size: 0,
    };

    let mut result = FerrocopyResult::empty();
    let mut operation: c_ulonglong = 0;
    let code = unsafe { ferrocopy_submit(handle, &request, &mut operation, &mut result) };
    assert_eq!(code, FerrocopyErrorCode::InvalidPath as c_int);
    assert_eq!(operation, 0);

    let message = unsafe { CStr::from_ptr(result.error_message) }.to_str().unwrap();
    assert!(!message.is_empty());
    let details = unsafe { CStr::from_ptr(result.error_details) }.to_str().unwrap();
    assert!(details.contains("\"code\":5"));
    unsafe { ferrocopy_free_result(&mut result) };

    ferrocopy_engine_destroy(handle);
    ferrocopy_cleanup();
}

#[derive(Default)]
struct Observed {
    percents: Vec<f64>,
    errors: Vec<c_int>,
}

extern "C" fn on_progress(
    percent: f64,
    _bytes: c_ulonglong,
    _total: c_ulonglong,
    _file: *const c_char,
    user_data: *mut c_void,
) {
    let observed = unsafe { &*(user_data as *const Mutex<Observed>) };
    observed.lock().unwrap().percents.push(percent);
}

extern "C" fn on_error(code: c_int, _message: *const c_char, _file: *const c_char, user_data: *mut c_void) {
    let observed = unsafe { &*(user_data as *const Mutex<Observed>) };
    observed.lock().unwrap().errors.push(code);
}

#[test]
fn test_copy_with_progress_callbacks() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);
    let handle = ferrocopy_engine_create();

    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("tree");
    std::fs::create_dir_all(source.join("sub")).unwrap();
    std::fs::write(source.join("a.txt"), vec![1u8; 4096]).unwrap();
    std::fs::write(source.join("sub/b.txt"), vec![2u8; 8192]).unwrap();
    let paths = Paths::new(&source, &temp_dir.path().join("out"));

    let observed = Mutex::new(Observed::default());
    let mut stats = FerrocopyStats::default();
    let mut result = FerrocopyResult::empty();
    let code = unsafe {
        ferrocopy_copy_with_progress(
            handle,
            &paths.request(0),
            Some(on_progress),
            Some(on_error),
            &observed as *const Mutex<Observed> as *mut c_void,
            &mut stats,
            &mut result,
        )
    };
    assert_eq!(code, 0);
    assert_eq!(stats.files_copied, 2);
    assert_eq!(stats.directories_created, 1);

    let observed = observed.into_inner().unwrap();
    assert!(observed.errors.is_empty());
    assert!(!observed.percents.is_empty());
    assert!(observed.percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(observed.percents.last().copied(), Some(100.0));

    unsafe { ferrocopy_free_result(&mut result) };
    ferrocopy_engine_destroy(handle);
    ferrocopy_cleanup();
}

#[test]
fn test_submit_wait_cancel() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);
    let handle = ferrocopy_engine_create();

    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("a.txt");
    std::fs::write(&source, b"hello").unwrap();
    let paths = Paths::new(&source, &temp_dir.path().join("b.txt"));

    let mut operation: c_ulonglong = 0;
    let code = unsafe { ferrocopy_submit(handle, &paths.request(1), &mut operation, ptr::null_mut()) };
    assert_eq!(code, 0);
    assert_ne!(operation, 0);

    let mut stats = FerrocopyStats::default();
    let code = unsafe { ferrocopy_wait(handle, operation, &mut stats, ptr::null_mut()) };
    assert_eq!(code, 0);
    assert_eq!(stats.files_copied, 1);
    assert!(!source.exists());

    // released after wait
    let code = unsafe { ferrocopy_wait(handle, operation, ptr::null_mut(), ptr::null_mut()) };
    assert_eq!(code, FerrocopyErrorCode::InvalidArgument as c_int);
    assert_eq!(ferrocopy_cancel(handle, operation), FerrocopyErrorCode::InvalidArgument as c_int);
    assert_eq!(ferrocopy_cancel(handle, 0), FerrocopyErrorCode::InvalidArgument as c_int);

    ferrocopy_engine_destroy(handle);
    ferrocopy_cleanup();
}

#[test]
fn test_device_info() {
    let _serial = serial();
    assert_eq!(ferrocopy_init(), 0);

    let temp_dir = TempDir::new().unwrap();
    let path = CString::new(temp_dir.path().to_str().unwrap()).unwrap();
    let mut info = std::mem::MaybeUninit::<FerrocopyDeviceInfo>::uninit();
    let code = unsafe { ferrocopy_get_device_info(path.as_ptr(), info.as_mut_ptr()) };
    assert_eq!(code, 0);

    let mut info = unsafe { info.assume_init() };
    assert!(!info.filesystem.is_null());
    assert!(!info.device_type_name.is_null());
    assert!(info.read_speed_mbps > 0.0);
    assert!(info.available_space <= info.total_space);
    unsafe { ferrocopy_free_device_info(&mut info) };
    assert!(info.filesystem.is_null());

    let missing = CString::new(temp_dir.path().join("missing").to_str().unwrap()).unwrap();
    let mut other = std::mem::MaybeUninit::<FerrocopyDeviceInfo>::uninit();
    let code = unsafe { ferrocopy_get_device_info(missing.as_ptr(), other.as_mut_ptr()) };
    assert_eq!(code, FerrocopyErrorCode::InvalidPath as c_int);

    ferrocopy_cleanup();
}
