//! Configuration management for ferrocopy
//!
//! This crate holds every tunable the engine consults: the device-class tuning
//! table used to pick buffer sizes and worker counts, the per-operation
//! policy (move fallback, sync delete, strict compression/verification), and
//! reporting, caching and logging settings.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: Buffer sizes, caps and intervals are checked on load
//! - **Environment overrides**: `FERROCOPY__SECTION__KEY` variables win over files
//! - **Defaults**: Every section has sensible defaults
//!
//! # Examples
//!
//! ```rust
//! use ferrocopy_config::ConfigBuilder;
//! use ferrocopy_types::DeviceType;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrocopy.yaml")
//!     .add_env_prefix("FERROCOPY")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! let hdd = config.performance.tuning.get(DeviceType::HDD);
//! assert_eq!(hdd.max_threads, 1);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrocopy_types::{BufferSize, ChecksumAlgorithm, CompressionAlgorithm, DeviceType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for ferrocopy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrency caps and the device tuning table
    pub performance: PerformanceConfig,
    /// Default behavior of copy, move and sync operations
    pub policy: OperationPolicy,
    /// Compression configuration
    pub compression: CompressionConfig,
    /// Verification configuration
    pub verification: VerificationConfig,
    /// Event delivery configuration
    pub reporting: ReportingConfig,
    /// Device profiling configuration
    pub device: DeviceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Performance-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum operations running at once per engine; further submissions queue
    pub max_concurrent_operations: usize,
    /// Worker permits shared by all operations of one engine
    pub max_total_workers: usize,
    /// Device class to buffer/thread defaults
    pub tuning: TuningTable,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 4,
            max_total_workers: 64,
            tuning: TuningTable::default(),
        }
    }
}

/// Tunable transfer parameters for one device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTuning {
    /// Chunk size used when the class is the slower endpoint
    pub buffer_size: BufferSize,
    /// Upper bound on workers touching this class, 0 to follow the CPU count
    pub max_threads: usize,
}

impl DeviceTuning {
    fn new(buffer_size: usize, max_threads: usize) -> Self {
        Self {
            buffer_size: BufferSize::new(buffer_size).unwrap_or_default(),
            max_threads,
        }
    }
}

/// Device-class tuning table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningTable {
    /// Spinning disks
    pub hdd: DeviceTuning,
    /// Solid state disks
    pub ssd: DeviceTuning,
    /// Network mounts
    pub network: DeviceTuning,
    /// RAM-backed filesystems
    pub ram_disk: DeviceTuning,
    /// Anything that could not be classified
    pub unknown: DeviceTuning,
}

impl Default for TuningTable {
    fn default() -> Self {
        Self {
            hdd: DeviceTuning::new(1024 * 1024, 1),
            ssd: DeviceTuning::new(4 * 1024 * 1024, 0),
            network: DeviceTuning::new(256 * 1024, 2),
            ram_disk: DeviceTuning::new(8 * 1024 * 1024, 0),
            unknown: DeviceTuning::new(1024 * 1024, 4),
        }
    }
}

impl TuningTable {
    /// Tuning entry for a device class
    pub const fn get(&self, device_type: DeviceType) -> &DeviceTuning {
        match device_type {
            DeviceType::HDD => &self.hdd,
            DeviceType::SSD => &self.ssd,
            DeviceType::Network => &self.network,
            DeviceType::RamDisk => &self.ram_disk,
            DeviceType::Unknown => &self.unknown,
        }
    }

    /// Replace the entry for a device class
    pub fn set(&mut self, device_type: DeviceType, tuning: DeviceTuning) {
        let slot = match device_type {
            DeviceType::HDD => &mut self.hdd,
            DeviceType::SSD => &mut self.ssd,
            DeviceType::Network => &mut self.network,
            DeviceType::RamDisk => &mut self.ram_disk,
            DeviceType::Unknown => &mut self.unknown,
        };
        *slot = tuning;
    }
}

/// What Move does when the source cannot be renamed onto the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveFallback {
    /// Copy every file, then delete the sources that were copied
    #[default]
    CopyThenDelete,
    /// Fail the operation
    Fail,
}

/// Per-operation behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationPolicy {
    /// Move behavior when rename is not possible
    pub move_fallback: MoveFallback,
    /// Sync deletes destination entries missing from the source
    pub delete_extraneous: bool,
    /// A compressor failure fails the operation instead of storing raw chunks
    pub strict_compression: bool,
    /// A checksum mismatch fails the operation instead of the file
    pub strict_verification: bool,
    /// Re-copies attempted after a checksum mismatch
    pub verification_retries: u32,
    /// Copy the targets of symbolic links instead of skipping them
    pub follow_symlinks: bool,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            move_fallback: MoveFallback::CopyThenDelete,
            delete_extraneous: true,
            strict_compression: false,
            strict_verification: false,
            verification_retries: 1,
            follow_symlinks: false,
        }
    }
}

/// Compression configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Algorithm used when a request asks for compression
    pub algorithm: CompressionAlgorithm,
    /// Compression level, meaningful for zstd (1-22)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Zstd,
            level: 3,
        }
    }
}

/// Verification configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Checksum used for every file of an operation
    pub algorithm: ChecksumAlgorithm,
}

/// Event delivery configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Minimum milliseconds between two progress events
    pub progress_interval_ms: u64,
    /// Capacity of the per-operation event queue
    pub event_queue_capacity: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 100,
            event_queue_capacity: 1024,
        }
    }
}

impl ReportingConfig {
    /// Minimum interval between progress events
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Device profiling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// How long a profile stays cached, in milliseconds
    pub cache_ttl_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { cache_ttl_ms: 5_000 }
    }
}

impl DeviceConfig {
    /// Cache lifetime
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_caps_sequential_devices() {
        let table = TuningTable::default();
        assert_eq!(table.get(DeviceType::HDD).max_threads, 1);
        assert_eq!(table.get(DeviceType::Network).max_threads, 2);
        assert_eq!(table.get(DeviceType::SSD).max_threads, 0);
        assert!(table.get(DeviceType::RamDisk).buffer_size > table.get(DeviceType::Network).buffer_size);
    }

    #[test]
    fn test_table_override() {
        let mut table = TuningTable::default();
        let tuning = DeviceTuning {
            buffer_size: BufferSize::new(64 * 1024).unwrap(),
            max_threads: 3,
        };
        table.set(DeviceType::SSD, tuning);
        assert_eq!(*table.get(DeviceType::SSD), tuning);
    }

    #[test]
    fn test_policy_defaults() {
        let policy = OperationPolicy::default();
        assert_eq!(policy.move_fallback, MoveFallback::CopyThenDelete);
        assert!(policy.delete_extraneous);
        assert!(!policy.strict_compression);
        assert!(!policy.strict_verification);
        assert_eq!(policy.verification_retries, 1);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("policy:\n  delete_extraneous: false\n").unwrap();
        assert!(!config.policy.delete_extraneous);
        assert_eq!(config.reporting, ReportingConfig::default());
        assert_eq!(config.performance.tuning, TuningTable::default());
    }
}
