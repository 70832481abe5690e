//! FFI-safe type definitions
//!
//! C-compatible structures passed across the boundary. Enumerations travel
//! as plain integers inside structures a caller fills in, since an
//! out-of-range discriminant in a `#[repr(C)]` enum is undefined behavior.

use ferrocopy_types::{CopyMode, CopyStats, DeviceInfo, DeviceType, ErrorCode};
use std::os::raw::{c_char, c_int, c_uint, c_ulonglong, c_void};
use std::ptr;

/// Copy operation modes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FerrocopyCopyMode {
    /// Copy files
    Copy = 0,
    /// Move files, deleting sources once copied
    Move = 1,
    /// Make the destination mirror the source
    Sync = 2,
}

impl From<FerrocopyCopyMode> for CopyMode {
    fn from(mode: FerrocopyCopyMode) -> Self {
        match mode {
            FerrocopyCopyMode::Copy => Self::Copy,
            FerrocopyCopyMode::Move => Self::Move,
            FerrocopyCopyMode::Sync => Self::Sync,
        }
    }
}

/// Device classes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FerrocopyDeviceType {
    /// Unknown device type
    Unknown = 0,
    /// Hard Disk Drive
    Hdd = 1,
    /// Solid State Drive
    Ssd = 2,
    /// Network storage
    Network = 3,
    /// RAM disk
    RamDisk = 4,
}

impl From<DeviceType> for FerrocopyDeviceType {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::HDD => Self::Hdd,
            DeviceType::SSD => Self::Ssd,
            DeviceType::Network => Self::Network,
            DeviceType::RamDisk => Self::RamDisk,
            DeviceType::Unknown => Self::Unknown,
        }
    }
}

/// Error codes, identical to the engine's numeric codes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FerrocopyErrorCode {
    /// Success
    Success = 0,
    /// Generic error
    GenericError = 1,
    /// File not found
    FileNotFound = 2,
    /// Permission denied
    PermissionDenied = 3,
    /// Insufficient space
    InsufficientSpace = 4,
    /// Invalid path
    InvalidPath = 5,
    /// Network error
    NetworkError = 6,
    /// Compression error
    CompressionError = 7,
    /// Verification error
    VerificationError = 8,
    /// Cancelled by user
    Cancelled = 9,
    /// Invalid argument
    InvalidArgument = 10,
    /// Out of memory
    OutOfMemory = 11,
    /// Timeout
    Timeout = 12,
}

impl From<ErrorCode> for FerrocopyErrorCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Success => Self::Success,
            ErrorCode::Generic => Self::GenericError,
            ErrorCode::FileNotFound => Self::FileNotFound,
            ErrorCode::PermissionDenied => Self::PermissionDenied,
            ErrorCode::InsufficientSpace => Self::InsufficientSpace,
            ErrorCode::InvalidPath => Self::InvalidPath,
            ErrorCode::Network => Self::NetworkError,
            ErrorCode::Compression => Self::CompressionError,
            ErrorCode::Verification => Self::VerificationError,
            ErrorCode::Cancelled => Self::Cancelled,
            ErrorCode::InvalidArgument => Self::InvalidArgument,
            ErrorCode::OutOfMemory => Self::OutOfMemory,
            ErrorCode::Timeout => Self::Timeout,
        }
    }
}

/// FFI-safe result
///
/// Strings are owned by the library; release them with
/// `ferrocopy_free_result`.
#[repr(C)]
#[derive(Debug)]
pub struct FerrocopyResult {
    /// Error code (0 = success, non-zero = error)
    pub error_code: c_int,
    /// Error message (null on success)
    pub error_message: *mut c_char,
    /// Error details as a JSON object (null if not available)
    pub error_details: *mut c_char,
}

impl FerrocopyResult {
    /// An empty success result
    pub const fn empty() -> Self {
        Self {
            error_code: FerrocopyErrorCode::Success as c_int,
            error_message: ptr::null_mut(),
            error_details: ptr::null_mut(),
        }
    }
}

impl Default for FerrocopyResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// FFI-safe copy statistics
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FerrocopyStats {
    /// Number of files copied
    pub files_copied: c_ulonglong,
    /// Number of directories created
    pub directories_created: c_ulonglong,
    /// Total bytes copied
    pub bytes_copied: c_ulonglong,
    /// Number of files skipped
    pub files_skipped: c_ulonglong,
    /// Number of errors encountered
    pub errors: c_ulonglong,
    /// Duration in milliseconds
    pub duration_ms: c_ulonglong,
    /// Transfer rate in MB/s
    pub transfer_rate_mbps: f64,
    /// Performance efficiency percentage
    pub efficiency_percent: f64,
}

impl From<&CopyStats> for FerrocopyStats {
    fn from(stats: &CopyStats) -> Self {
        Self {
            files_copied: stats.files_copied,
            directories_created: stats.directories_created,
            bytes_copied: stats.bytes_copied,
            files_skipped: stats.files_skipped,
            errors: stats.errors,
            duration_ms: c_ulonglong::try_from(stats.duration.as_millis()).unwrap_or(c_ulonglong::MAX),
            transfer_rate_mbps: stats.transfer_rate_mbps(),
            efficiency_percent: stats.efficiency_percent,
        }
    }
}

/// FFI-safe device information
#[repr(C)]
#[derive(Debug)]
pub struct FerrocopyDeviceInfo {
    /// Device class
    pub device_type: FerrocopyDeviceType,
    /// Device class name
    pub device_type_name: *mut c_char,
    /// Filesystem type
    pub filesystem: *mut c_char,
    /// Mount point or volume root
    pub mount_point: *mut c_char,
    /// Total space in bytes
    pub total_space: c_ulonglong,
    /// Available space in bytes
    pub available_space: c_ulonglong,
    /// Theoretical read speed in MB/s
    pub read_speed_mbps: f64,
    /// Theoretical write speed in MB/s
    pub write_speed_mbps: f64,
}

impl From<&DeviceInfo> for FerrocopyDeviceInfo {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            device_type: info.device_type.into(),
            device_type_name: crate::rust_string_to_c(info.device_type.to_string()),
            filesystem: crate::rust_string_to_c(info.filesystem.clone()),
            mount_point: crate::rust_string_to_c(info.mount_point.to_string_lossy().into_owned()),
            total_space: info.total_space,
            available_space: info.available_space,
            read_speed_mbps: info.read_speed_mbps,
            write_speed_mbps: info.write_speed_mbps,
        }
    }
}

/// FFI-safe copy request
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FerrocopyCopyRequest {
    /// Source path
    pub source: *const c_char,
    /// Destination path
    pub destination: *const c_char,
    /// Copy mode (0=copy, 1=move, 2=sync)
    pub mode: c_int,
    /// Enable compression
    pub compress: c_int,
    /// Preserve metadata
    pub preserve_metadata: c_int,
    /// Verify copy
    pub verify_copy: c_int,
    /// Number of threads (0 = auto)
    pub threads: c_uint,
    /// Buffer size in bytes (0 = auto)
    pub buffer_size: c_ulonglong,
}

/// Progress callback function type
pub type ProgressCallback = extern "C" fn(
    progress_percent: f64,
    bytes_copied: c_ulonglong,
    total_bytes: c_ulonglong,
    current_file: *const c_char,
    user_data: *mut c_void,
);

/// Error callback function type
pub type ErrorCallback = extern "C" fn(
    error_code: c_int,
    error_message: *const c_char,
    file_path: *const c_char,
    user_data: *mut c_void,
);

/// Convert C int to boolean
pub(crate) const fn c_int_to_bool(value: c_int) -> bool {
    value != 0
}

/// Convert boolean to C int
pub(crate) const fn bool_to_c_int(value: bool) -> c_int {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_codes_match_engine() {
        for code in ErrorCode::ALL {
            assert_eq!(FerrocopyErrorCode::from(code) as c_int, code.as_i32());
        }
    }

    #[test]
    fn test_copy_mode_conversion() {
        assert_eq!(CopyMode::from(FerrocopyCopyMode::Move), CopyMode::Move);
        assert_eq!(CopyMode::from(FerrocopyCopyMode::Sync).as_raw(), FerrocopyCopyMode::Sync as i32);
    }

    #[test]
    fn test_bool_conversion() {
        assert_eq!(bool_to_c_int(true), 1);
        assert_eq!(bool_to_c_int(false), 0);
        assert!(c_int_to_bool(1));
        assert!(!c_int_to_bool(0));
        assert!(c_int_to_bool(-1)); // Non-zero is true
    }

    #[test]
    fn test_stats_conversion() {
        let mut stats = CopyStats::new();
        stats.files_copied = 3;
        stats.bytes_copied = 2_000_000;
        stats.finish(Duration::from_secs(2), 0.0);

        let ffi = FerrocopyStats::from(&stats);
        assert_eq!(ffi.files_copied, 3);
        assert_eq!(ffi.duration_ms, 2000);
        assert!(ffi.transfer_rate_mbps > 0.0);
        assert_eq!(ffi.efficiency_percent, 0.0);
    }
}
