//! Core data types for ferrocopy
//!
//! Requests, device snapshots, statistics and the events the engine emits
//! while an operation runs.

use crate::{Error, ErrorCode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes per megabyte as used by throughput figures.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What an operation does with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CopyMode {
    /// Copy files, leaving the source untouched
    #[default]
    Copy,
    /// Move files: rename when possible, otherwise copy then delete the source
    Move,
    /// Make the destination mirror the source
    Sync,
}

impl CopyMode {
    /// Map the numeric mode used by foreign callers (0 copy, 1 move, 2 sync).
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Copy),
            1 => Some(Self::Move),
            2 => Some(Self::Sync),
            _ => None,
        }
    }

    /// Numeric form of this mode.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Copy => 0,
            Self::Move => 1,
            Self::Sync => 2,
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Sync => "sync",
        })
    }
}

/// Device type for optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceType {
    /// Hard Disk Drive
    HDD,
    /// Solid State Drive
    SSD,
    /// Network storage
    Network,
    /// RAM disk
    RamDisk,
    /// Unknown device type
    Unknown,
}

impl DeviceType {
    /// Every device class.
    pub const ALL: [Self; 5] = [Self::HDD, Self::SSD, Self::Network, Self::RamDisk, Self::Unknown];

    /// Heuristic (read, write) throughput in MB/s.
    ///
    /// Only used for efficiency reporting and for picking the slower endpoint.
    pub const fn theoretical_speeds(self) -> (f64, f64) {
        match self {
            Self::HDD => (150.0, 140.0),
            Self::SSD => (500.0, 450.0),
            Self::Network => (100.0, 80.0),
            Self::RamDisk => (2000.0, 1800.0),
            Self::Unknown => (100.0, 80.0),
        }
    }

    /// Whether concurrent access to this class causes seek or latency thrashing.
    pub const fn prefers_sequential(self) -> bool {
        matches!(self, Self::HDD | Self::Network)
    }

    /// Numeric form used across the C boundary.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::HDD => 0,
            Self::SSD => 1,
            Self::Network => 2,
            Self::RamDisk => 3,
            Self::Unknown => 4,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HDD => "HDD",
            Self::SSD => "SSD",
            Self::Network => "Network",
            Self::RamDisk => "RamDisk",
            Self::Unknown => "Unknown",
        })
    }
}

/// Snapshot of the device backing a path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    /// Device classification
    pub device_type: DeviceType,
    /// Filesystem name, `unknown` when it could not be read
    pub filesystem: String,
    /// Mount point or volume root containing the path
    pub mount_point: PathBuf,
    /// Total capacity in bytes, 0 when unknown
    pub total_space: u64,
    /// Available capacity in bytes, 0 when unknown
    pub available_space: u64,
    /// Filesystem block size in bytes, 0 when unknown
    pub block_size: u64,
    /// Theoretical read throughput in MB/s
    pub read_speed_mbps: f64,
    /// Theoretical write throughput in MB/s
    pub write_speed_mbps: f64,
}

impl DeviceInfo {
    /// Build a snapshot with the theoretical speeds of `device_type`.
    pub fn new(device_type: DeviceType, filesystem: impl Into<String>, mount_point: PathBuf) -> Self {
        let (read, write) = device_type.theoretical_speeds();
        Self {
            device_type,
            filesystem: filesystem.into(),
            mount_point,
            total_space: 0,
            available_space: 0,
            block_size: 0,
            read_speed_mbps: read,
            write_speed_mbps: write,
        }
    }

    /// Snapshot used when nothing about the device could be read.
    pub fn unknown(mount_point: PathBuf) -> Self {
        Self::new(DeviceType::Unknown, "unknown", mount_point)
    }

    /// Set capacity figures.
    pub fn with_capacity(mut self, total: u64, available: u64, block_size: u64) -> Self {
        self.total_space = total;
        self.available_space = available;
        self.block_size = block_size;
        self
    }
}

/// Lifecycle phase of a copy operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum OperationPhase {
    /// Validating and profiling devices, computing the sync diff
    Planning = 0,
    /// Walking the source tree and creating directories
    Traversing = 1,
    /// Moving bytes
    Transferring = 2,
    /// Comparing checksums
    Verifying = 3,
    /// Deleting moved sources or extraneous sync files, aggregating statistics
    Finalizing = 4,
    /// Finished, possibly with soft per-file errors
    Completed = 5,
    /// Aborted by an operation-wide error
    Failed = 6,
    /// Stopped by cancellation or timeout
    Cancelled = 7,
}

impl OperationPhase {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Decode a phase stored as a byte.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Planning,
            1 => Self::Traversing,
            2 => Self::Transferring,
            3 => Self::Verifying,
            4 => Self::Finalizing,
            5 => Self::Completed,
            6 => Self::Failed,
            _ => Self::Cancelled,
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress notification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressEvent {
    /// Overall progress, 0 to 100
    pub percent: f64,
    /// Bytes transferred so far
    pub bytes_copied: u64,
    /// Bytes the operation plans to transfer
    pub total_bytes: u64,
    /// File being transferred when the event was produced
    pub current_file: PathBuf,
}

impl ProgressEvent {
    /// Build an event, deriving the percentage.
    pub fn new(bytes_copied: u64, total_bytes: u64, current_file: impl Into<PathBuf>) -> Self {
        let percent = if total_bytes == 0 {
            100.0
        } else {
            (bytes_copied as f64 / total_bytes as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            percent,
            bytes_copied,
            total_bytes,
            current_file: current_file.into(),
        }
    }
}

/// A per-item or operation-wide error as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorRecord {
    /// Taxonomy code
    pub code: ErrorCode,
    /// Human readable message
    pub message: String,
    /// Offending path
    pub path: Option<PathBuf>,
}

impl ErrorRecord {
    /// Build a record from an error, falling back to `path` when the error carries none.
    pub fn from_error(error: &Error, path: Option<&Path>) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            path: error.path().or(path).map(Path::to_path_buf),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {} ({})", self.code.as_i32(), self.message, path.display()),
            None => write!(f, "[{}] {}", self.code.as_i32(), self.message),
        }
    }
}

/// File copy statistics, produced once when an operation ends
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CopyStats {
    /// Number of files copied
    pub files_copied: u64,
    /// Number of directories created
    pub directories_created: u64,
    /// Total bytes copied
    pub bytes_copied: u64,
    /// Number of files skipped
    pub files_skipped: u64,
    /// Number of errors encountered
    pub errors: u64,
    /// Total duration of the operation
    pub duration: Duration,
    /// Observed transfer rate in bytes per second
    pub transfer_rate: f64,
    /// Observed rate relative to the slower device's theoretical rate, 0 to 100
    pub efficiency_percent: f64,
}

impl CopyStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration and derive rate and efficiency against `theoretical_mbps`.
    pub fn finish(&mut self, duration: Duration, theoretical_mbps: f64) {
        self.duration = duration;
        let seconds = duration.as_secs_f64();
        self.transfer_rate = if seconds > 0.0 {
            self.bytes_copied as f64 / seconds
        } else {
            0.0
        };
        self.efficiency_percent = efficiency_percent(self.transfer_rate, theoretical_mbps);
    }

    /// Transfer rate in MB/s
    pub fn transfer_rate_mbps(&self) -> f64 {
        self.transfer_rate / BYTES_PER_MB
    }
}

/// Observed rate (bytes/s) as a percentage of a theoretical rate (MB/s), clamped to 0..=100.
pub fn efficiency_percent(rate_bytes_per_sec: f64, theoretical_mbps: f64) -> f64 {
    if theoretical_mbps.is_nan() || theoretical_mbps <= 0.0 || !rate_bytes_per_sec.is_finite() {
        return 0.0;
    }
    let ratio = rate_bytes_per_sec / (theoretical_mbps * BYTES_PER_MB) * 100.0;
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 100.0)
    }
}

/// Checksum algorithm used by verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChecksumAlgorithm {
    /// BLAKE3
    #[default]
    Blake3,
    /// XXH3 128-bit
    Xxh3,
}

/// Compression algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CompressionAlgorithm {
    /// Zstandard
    #[default]
    Zstd,
    /// LZ4
    Lz4,
}
