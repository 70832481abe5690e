//! JSON output structures for the ferrocopy CLI

use ferrocopy_engine::OperationReport;
use ferrocopy_types::{CopyMode, CopyStats, DeviceInfo};
use serde::Serialize;
use std::path::Path;

/// Complete JSON output for a copy, move or sync
#[derive(Debug, Serialize)]
pub struct OperationJson {
    /// ferrocopy version
    pub version: String,
    /// Operation type
    pub operation: String,
    /// Source path
    pub source_path: String,
    /// Destination path
    pub destination_path: String,
    /// Terminal phase
    pub phase: String,
    /// Overall result
    pub result: ResultJson,
    /// Copy statistics
    pub copy_stats: CopyStatsJson,
    /// Source device information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_device: Option<DeviceInfoJson>,
    /// Destination device information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_device: Option<DeviceInfoJson>,
}

impl OperationJson {
    /// Build the output for a finished operation
    pub fn new(mode: CopyMode, source: &Path, destination: &Path, report: &OperationReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operation: mode.to_string(),
            source_path: source.display().to_string(),
            destination_path: destination.display().to_string(),
            phase: report.phase.to_string(),
            result: ResultJson {
                success: report.is_success(),
                error_code: report.error_code().as_i32(),
                error_message: report.error.as_ref().map(ToString::to_string),
            },
            copy_stats: CopyStatsJson::from(&report.stats),
            source_device: report.source_device.as_ref().map(DeviceInfoJson::from),
            destination_device: report.destination_device.as_ref().map(DeviceInfoJson::from),
        }
    }
}

/// Outcome of the operation
#[derive(Debug, Serialize)]
pub struct ResultJson {
    /// Whether the operation completed
    pub success: bool,
    /// Numeric error code, 0 on success
    pub error_code: i32,
    /// Operation-wide error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Copy statistics in JSON format
#[derive(Debug, Serialize)]
pub struct CopyStatsJson {
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
    /// Duration in milliseconds
    pub duration_ms: u128,
    /// Transfer rate in MB/s
    pub transfer_rate_mbps: f64,
    /// Efficiency against the slower device, 0 to 100
    pub efficiency_percent: f64,
}

impl From<&CopyStats> for CopyStatsJson {
    fn from(stats: &CopyStats) -> Self {
        Self {
            files_copied: stats.files_copied,
            directories_created: stats.directories_created,
            bytes_copied: stats.bytes_copied,
            files_skipped: stats.files_skipped,
            errors: stats.errors,
            duration_ms: stats.duration.as_millis(),
            transfer_rate_mbps: stats.transfer_rate_mbps(),
            efficiency_percent: stats.efficiency_percent,
        }
    }
}

/// Device information in JSON format
#[derive(Debug, Serialize)]
pub struct DeviceInfoJson {
    /// Device class
    pub device_type: String,
    /// Filesystem type
    pub filesystem: String,
    /// Mount point
    pub mount_point: String,
    /// Total space in bytes
    pub total_space_bytes: u64,
    /// Available space in bytes
    pub available_space_bytes: u64,
    /// Filesystem block size in bytes
    pub block_size: u64,
    /// Theoretical read speed in MB/s
    pub theoretical_read_speed_mbps: f64,
    /// Theoretical write speed in MB/s
    pub theoretical_write_speed_mbps: f64,
}

impl From<&DeviceInfo> for DeviceInfoJson {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            device_type: info.device_type.to_string().to_lowercase(),
            filesystem: info.filesystem.clone(),
            mount_point: info.mount_point.display().to_string(),
            total_space_bytes: info.total_space,
            available_space_bytes: info.available_space,
            block_size: info.block_size,
            theoretical_read_speed_mbps: info.read_speed_mbps,
            theoretical_write_speed_mbps: info.write_speed_mbps,
        }
    }
}
