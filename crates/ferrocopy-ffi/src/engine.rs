//! FFI engine interface
//!
//! Engines live in a process-wide handle table next to the tokio runtime
//! that drives them. A handle is an opaque non-zero 64-bit value; zero means
//! "no engine". Handles carry a generation, so a destroyed engine's handle
//! is rejected rather than aliasing a newer engine. The table lock is never
//! held while an operation runs.

use ferrocopy_config::{Config, ConfigLoader};
use ferrocopy_device::DeviceProfiler;
use ferrocopy_engine::{CopyEngine, CopyRequest, Handle, HandleTable, OperationId, OperationReport};
use ferrocopy_types::{CopyMode, Error, Result};
use std::os::raw::{c_char, c_int, c_ulonglong, c_void};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Handle as RuntimeHandle, Runtime};
use tracing::{debug, info, warn};

use crate::callbacks::CallbackContext;
use crate::error::{guard, write_result};
use crate::types::{
    c_int_to_bool, ErrorCallback, FerrocopyCopyRequest, FerrocopyDeviceInfo, FerrocopyResult,
    FerrocopyStats, ProgressCallback,
};

/// Engine handle type
pub type EngineHandle = c_ulonglong;

struct FfiState {
    runtime: Runtime,
    engines: HandleTable<CopyEngine>,
    profiler: Arc<DeviceProfiler>,
}

static STATE: Mutex<Option<FfiState>> = Mutex::new(None);

fn state() -> MutexGuard<'static, Option<FfiState>> {
    STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_initialized() -> Error {
    Error::generic("ferrocopy is not initialized; call ferrocopy_init first")
}

/// Start the runtime. A second call while initialized is a no-op.
pub(crate) fn initialize() -> Result<()> {
    let mut state = state();
    if state.is_some() {
        return Ok(());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ferrocopy-worker")
        .build()
        .map_err(|e| Error::generic(format!("failed to start runtime: {}", e)))?;
    *state = Some(FfiState {
        runtime,
        engines: HandleTable::new(),
        profiler: Arc::new(DeviceProfiler::new()),
    });
    info!("ferrocopy {} initialized", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Destroy every engine and stop the runtime.
pub(crate) fn cleanup() {
    let Some(mut taken) = state().take() else {
        return;
    };
    let engines = taken.engines.drain();
    for (_, engine) in engines {
        taken.runtime.block_on(engine.shutdown());
    }
    drop(taken);
    info!("ferrocopy cleaned up");
}

fn runtime() -> Result<RuntimeHandle> {
    state()
        .as_ref()
        .map(|s| s.runtime.handle().clone())
        .ok_or_else(not_initialized)
}

fn lookup(handle: EngineHandle) -> Result<(RuntimeHandle, CopyEngine)> {
    let state = state();
    let state = state.as_ref().ok_or_else(not_initialized)?;
    let engine = Handle::from_raw(handle)
        .and_then(|h| state.engines.get(h))
        .ok_or_else(|| Error::invalid_argument(format!("invalid engine handle {:#x}", handle)))?;
    Ok((state.runtime.handle().clone(), engine.clone()))
}

fn operation_id(operation: c_ulonglong) -> Result<OperationId> {
    Handle::from_raw(operation)
        .ok_or_else(|| Error::invalid_argument(format!("invalid operation id {:#x}", operation)))
}

/// Build an engine request from its C form.
///
/// # Safety
///
/// `request` must be null or point to a valid `FerrocopyCopyRequest` whose
/// strings are null or valid null-terminated C strings.
unsafe fn request_from_ffi(request: *const FerrocopyCopyRequest) -> Result<CopyRequest> {
    let request = request
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("request is null"))?;
    let mode = CopyMode::from_raw(request.mode)
        .ok_or_else(|| Error::invalid_argument(format!("invalid copy mode {}", request.mode)))?;
    let source = crate::c_string_to_path(request.source)?;
    let destination = crate::c_string_to_path(request.destination)?;

    Ok(CopyRequest::new(source, destination)
        .with_mode(mode)
        .compress(c_int_to_bool(request.compress))
        .preserve_metadata(c_int_to_bool(request.preserve_metadata))
        .verify_copy(c_int_to_bool(request.verify_copy))
        .with_threads(request.threads)
        .with_buffer_size(request.buffer_size))
}

/// Write the report's statistics and map its outcome to a result code.
unsafe fn finish(
    report: Result<OperationReport>,
    stats: *mut FerrocopyStats,
    result: *mut FerrocopyResult,
) -> c_int {
    let outcome = report.and_then(|report| {
        if !stats.is_null() {
            stats.write(FerrocopyStats::from(&report.stats));
        }
        report.error.map_or(Ok(()), Err)
    });
    write_result(result, outcome)
}

/// Create a new ferrocopy engine
///
/// The engine uses the configuration found in the default locations, or
/// built-in defaults when none is found. Returns a handle to the engine, or
/// 0 on failure.
#[no_mangle]
pub extern "C" fn ferrocopy_engine_create() -> EngineHandle {
    let created = guard(|| {
        let config = ConfigLoader::load_default().unwrap_or_else(|e| {
            warn!("Ignoring configuration: {}", e);
            Config::default()
        });
        let mut state = state();
        let state = state.as_mut().ok_or_else(not_initialized)?;
        let engine = CopyEngine::with_runtime(config, state.runtime.handle().clone())?;
        state
            .engines
            .insert(engine)
            .ok_or_else(|| Error::out_of_memory("engine table is full"))
    });
    match created {
        Ok(handle) => {
            debug!("Created engine {}", handle);
            handle.get()
        }
        Err(e) => {
            warn!("Failed to create engine: {}", e);
            0
        }
    }
}

/// Destroy a ferrocopy engine
///
/// Cancels and awaits every operation the engine still owns. Destroying an
/// unknown or already destroyed handle does nothing.
#[no_mangle]
pub extern "C" fn ferrocopy_engine_destroy(handle: EngineHandle) {
    let _ = guard(|| {
        let removed = {
            let mut state = state();
            state.as_mut().and_then(|s| {
                let engine = s.engines.remove(Handle::from_raw(handle)?)?;
                Some((s.runtime.handle().clone(), engine))
            })
        };
        if let Some((runtime, engine)) = removed {
            runtime.block_on(engine.shutdown());
            debug!("Destroyed engine {:#x}", handle);
        }
        Ok(())
    });
}

/// Execute a copy operation and wait for it to finish
///
/// Returns the result code, also stored in `result`. `stats` may be null.
///
/// # Safety
///
/// All string pointers in the request must be valid null-terminated C strings.
/// `stats` and `result` must be null or writable. The result must be freed
/// with `ferrocopy_free_result`.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_copy(
    handle: EngineHandle,
    request: *const FerrocopyCopyRequest,
    stats: *mut FerrocopyStats,
    result: *mut FerrocopyResult,
) -> c_int {
    ferrocopy_copy_with_progress(handle, request, None, None, ptr::null_mut(), stats, result)
}

/// Execute a copy operation with progress and error callbacks
///
/// Callbacks run on a library thread, one at a time, and must not call back
/// into ferrocopy. `user_data` is passed through unchanged.
///
/// # Safety
///
/// As for `ferrocopy_copy`. The callbacks and `user_data` must stay valid
/// until this function returns.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_copy_with_progress(
    handle: EngineHandle,
    request: *const FerrocopyCopyRequest,
    progress_callback: Option<ProgressCallback>,
    error_callback: Option<ErrorCallback>,
    user_data: *mut c_void,
    stats: *mut FerrocopyStats,
    result: *mut FerrocopyResult,
) -> c_int {
    let report = guard(|| {
        let request = request_from_ffi(request)?;
        let (runtime, engine) = lookup(handle)?;
        let callbacks = CallbackContext::new(progress_callback, error_callback, user_data);
        let id = if callbacks.is_empty() {
            engine.submit(request)?
        } else {
            engine.submit_with_observer(request, Arc::new(callbacks))?
        };
        runtime.block_on(engine.wait(id))
    });
    finish(report, stats, result)
}

/// Start a copy operation without waiting for it
///
/// On success the operation id is stored in `operation`; pass it to
/// `ferrocopy_wait` exactly once to release it.
///
/// # Safety
///
/// As for `ferrocopy_copy`; `operation` must be writable.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_submit(
    handle: EngineHandle,
    request: *const FerrocopyCopyRequest,
    operation: *mut c_ulonglong,
    result: *mut FerrocopyResult,
) -> c_int {
    let outcome = guard(|| {
        if operation.is_null() {
            return Err(Error::invalid_argument("operation out-pointer is null"));
        }
        let request = request_from_ffi(request)?;
        let (_, engine) = lookup(handle)?;
        let id = engine.submit(request)?;
        operation.write(id.get());
        Ok(())
    });
    write_result(result, outcome)
}

/// Wait for an operation started with `ferrocopy_submit`
///
/// # Safety
///
/// `stats` and `result` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_wait(
    handle: EngineHandle,
    operation: c_ulonglong,
    stats: *mut FerrocopyStats,
    result: *mut FerrocopyResult,
) -> c_int {
    let report = guard(|| {
        let id = operation_id(operation)?;
        let (runtime, engine) = lookup(handle)?;
        runtime.block_on(engine.wait(id))
    });
    finish(report, stats, result)
}

/// Request cancellation of a running operation
///
/// Cancellation is cooperative; `ferrocopy_wait` reports when it took effect.
#[no_mangle]
pub extern "C" fn ferrocopy_cancel(handle: EngineHandle, operation: c_ulonglong) -> c_int {
    let outcome = guard(|| {
        let id = operation_id(operation)?;
        let (_, engine) = lookup(handle)?;
        engine.cancel(id)
    });
    outcome.map_or_else(|e| e.code().as_i32(), |()| 0)
}

/// Get device information for a path
///
/// # Safety
///
/// The path must be a valid null-terminated C string and `device_info`
/// writable. On success the structure must be released with
/// `ferrocopy_free_device_info`.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_get_device_info(
    path: *const c_char,
    device_info: *mut FerrocopyDeviceInfo,
) -> c_int {
    let outcome = guard(|| {
        if path.is_null() || device_info.is_null() {
            return Err(Error::invalid_argument("null argument"));
        }
        let path = crate::c_string_to_path(path)?;
        let profiler = state()
            .as_ref()
            .map(|s| Arc::clone(&s.profiler))
            .ok_or_else(not_initialized)?;
        let info = runtime()?.block_on(profiler.profile(&path))?;
        device_info.write(FerrocopyDeviceInfo::from(&info));
        Ok(())
    });
    outcome.map_or_else(|e| e.code().as_i32(), |()| 0)
}

/// Free device information
///
/// # Safety
///
/// The structure must have been filled by `ferrocopy_get_device_info`.
#[no_mangle]
pub unsafe extern "C" fn ferrocopy_free_device_info(device_info: *mut FerrocopyDeviceInfo) {
    if let Some(info) = device_info.as_mut() {
        for field in [&mut info.device_type_name, &mut info.filesystem, &mut info.mount_point] {
            crate::ferrocopy_free_string(*field);
            *field = ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn request(source: &CString, destination: &CString, mode: c_int) -> FerrocopyCopyRequest {
        FerrocopyCopyRequest {
            source: source.as_ptr(),
            destination: destination.as_ptr(),
            mode,
            compress: 0,
            preserve_metadata: 1,
            verify_copy: 0,
            threads: 0,
            buffer_size: 0,
        }
    }

    #[test]
    fn test_request_conversion() {
        let source = CString::new("src").unwrap();
        let destination = CString::new("dst").unwrap();
        let mut raw = request(&source, &destination, 2);
        raw.threads = 3;
        raw.buffer_size = 4096;

        let converted = unsafe { request_from_ffi(&raw) }.unwrap();
        assert_eq!(converted.mode, CopyMode::Sync);
        assert_eq!(converted.source, std::path::PathBuf::from("src"));
        assert!(converted.preserve_metadata);
        assert_eq!(converted.threads, 3);
        assert_eq!(converted.buffer_size, 4096);
    }

    #[test]
    fn test_request_rejects_bad_mode_and_null() {
        let source = CString::new("src").unwrap();
        let destination = CString::new("dst").unwrap();
        let raw = request(&source, &destination, 7);
        assert!(unsafe { request_from_ffi(&raw) }.is_err());
        assert!(unsafe { request_from_ffi(ptr::null()) }.is_err());
    }

    #[test]
    fn test_null_paths_become_empty() {
        let empty = CString::default();
        let mut raw = request(&empty, &empty, 0);
        raw.source = ptr::null();
        let converted = unsafe { request_from_ffi(&raw) }.unwrap();
        assert!(converted.source.as_os_str().is_empty());
        assert!(converted.validate().is_err());
    }

    #[test]
    fn test_zero_operation_id_rejected() {
        assert!(operation_id(0).is_err());
    }
}
