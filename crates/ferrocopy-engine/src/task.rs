//! Copy requests and operation results

use crate::handle::Handle;
use ferrocopy_config::OperationPolicy;
use ferrocopy_device::TransferHints;
use ferrocopy_types::{CopyMode, CopyStats, DeviceInfo, Error, ErrorCode, OperationPhase, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of an operation within its engine
pub type OperationId = Handle;

/// Copy request containing all parameters for a copy operation
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    /// Source path
    pub source: PathBuf,
    /// Destination path
    pub destination: PathBuf,
    /// Copy mode
    pub mode: CopyMode,
    /// Write destinations as compressed frame streams
    pub compress: bool,
    /// Whether to preserve timestamps and permissions
    pub preserve_metadata: bool,
    /// Whether to verify the copy
    pub verify_copy: bool,
    /// Worker count hint, 0 for automatic
    pub threads: u32,
    /// Chunk size hint in bytes, 0 for automatic
    pub buffer_size: u64,
    /// Optional deadline for the whole operation
    pub timeout: Option<Duration>,
    /// Overrides the engine's configured policy
    pub policy: Option<OperationPolicy>,
}

impl CopyRequest {
    /// Create a new copy request with default settings
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(source: P1, destination: P2) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: CopyMode::Copy,
            compress: false,
            preserve_metadata: false,
            verify_copy: false,
            threads: 0,
            buffer_size: 0,
            timeout: None,
            policy: None,
        }
    }

    /// Set the copy mode
    pub fn with_mode(mut self, mode: CopyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable compression
    pub fn compress(mut self, enable: bool) -> Self {
        self.compress = enable;
        self
    }

    /// Enable metadata preservation
    pub fn preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// Enable copy verification
    pub fn verify_copy(mut self, verify: bool) -> Self {
        self.verify_copy = verify;
        self
    }

    /// Set the worker count hint
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Set the chunk size hint
    pub fn with_buffer_size(mut self, buffer_size: u64) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set a deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the engine policy for this request
    pub fn with_policy(mut self, policy: OperationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Strategy hints carried by the request
    pub fn hints(&self) -> TransferHints {
        TransferHints {
            threads: self.threads,
            buffer_size: self.buffer_size,
        }
    }

    /// Checks that need no filesystem access
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::invalid_path(&self.source, "source path is empty"));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(Error::invalid_path(&self.destination, "destination path is empty"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::invalid_argument("timeout must be greater than zero"));
        }
        self.hints().validate()
    }
}

/// Live view of a running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStatus {
    /// Current phase
    pub phase: OperationPhase,
    /// Bytes transferred so far
    pub bytes_copied: u64,
    /// Bytes planned, known once planning ends
    pub total_bytes: u64,
    /// Files fully copied
    pub files_copied: u64,
    /// Error records emitted
    pub errors: u64,
}

/// Final result of an operation
#[derive(Debug, Clone)]
pub struct OperationReport {
    /// Operation identifier
    pub id: OperationId,
    /// Terminal phase
    pub phase: OperationPhase,
    /// Aggregated statistics
    pub stats: CopyStats,
    /// Operation-wide error for `Failed` and `Cancelled` outcomes
    pub error: Option<Error>,
    /// Profile of the source device, when planning got that far
    pub source_device: Option<DeviceInfo>,
    /// Profile of the destination device, when planning got that far
    pub destination_device: Option<DeviceInfo>,
}

impl OperationReport {
    /// Whether the operation completed
    pub fn is_success(&self) -> bool {
        self.phase == OperationPhase::Completed
    }

    /// Result code as seen across the FFI boundary
    pub fn error_code(&self) -> ErrorCode {
        self.error.as_ref().map_or(ErrorCode::Success, Error::code)
    }

    /// Convert into a `Result`, keeping statistics on success
    pub fn into_result(self) -> Result<CopyStats> {
        match self.error {
            None => Ok(self.stats),
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_request_builder() {
        let request = CopyRequest::new("src", "dst")
            .with_mode(CopyMode::Sync)
            .compress(true)
            .preserve_metadata(true)
            .verify_copy(true)
            .with_threads(4)
            .with_buffer_size(65536)
            .with_timeout(Duration::from_secs(30));

        assert_eq!(request.mode, CopyMode::Sync);
        assert!(request.compress);
        assert!(request.preserve_metadata);
        assert!(request.verify_copy);
        assert_eq!(request.hints(), TransferHints { threads: 4, buffer_size: 65536 });
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let err = CopyRequest::new("", "dst").validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPath);

        let err = CopyRequest::new("src", "").validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPath);

        let err = CopyRequest::new("src", "dst").with_threads(100_000).validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        let err = CopyRequest::new("src", "dst")
            .with_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_report_result() {
        let id = Handle::from_raw(1).unwrap();
        let mut report = OperationReport {
            id,
            phase: OperationPhase::Completed,
            stats: CopyStats::new(),
            error: None,
            source_device: None,
            destination_device: None,
        };
        assert!(report.is_success());
        assert_eq!(report.error_code(), ErrorCode::Success);

        report.phase = OperationPhase::Cancelled;
        report.error = Some(Error::Cancelled);
        assert!(!report.is_success());
        assert_eq!(report.error_code(), ErrorCode::Cancelled);
        assert!(report.into_result().is_err());
    }
}
