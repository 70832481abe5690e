//! Error types and handling for ferrocopy
//!
//! Every failure the engine can surface belongs to a closed taxonomy. Each
//! [`Error`] variant maps to exactly one [`ErrorCode`], which is the value that
//! crosses the C boundary and the value carried by [`crate::ErrorRecord`].

use std::io;
use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - recorded, processing continues
    Low,
    /// Medium severity - the affected item fails, the operation continues
    Medium,
    /// High severity - the operation should be aborted
    High,
    /// Critical severity - the engine itself is unusable
    Critical,
}

/// Stable numeric error codes shared with foreign callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum ErrorCode {
    /// No error
    Success = 0,
    /// Unclassified failure
    Generic = 1,
    /// A file or directory does not exist
    FileNotFound = 2,
    /// Access was refused by the filesystem
    PermissionDenied = 3,
    /// The destination volume is full
    InsufficientSpace = 4,
    /// A path is empty, malformed or does not exist
    InvalidPath = 5,
    /// A network filesystem reported a failure
    Network = 6,
    /// The compressor failed
    Compression = 7,
    /// Source and destination digests differ
    Verification = 8,
    /// The operation was cancelled
    Cancelled = 9,
    /// A request parameter is invalid
    InvalidArgument = 10,
    /// Allocation failed
    OutOfMemory = 11,
    /// The operation exceeded its deadline
    Timeout = 12,
}

impl ErrorCode {
    /// All codes in ascending order.
    pub const ALL: [Self; 13] = [
        Self::Success,
        Self::Generic,
        Self::FileNotFound,
        Self::PermissionDenied,
        Self::InsufficientSpace,
        Self::InvalidPath,
        Self::Network,
        Self::Compression,
        Self::Verification,
        Self::Cancelled,
        Self::InvalidArgument,
        Self::OutOfMemory,
        Self::Timeout,
    ];

    /// Numeric value of this code.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a code by its numeric value.
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_i32() == value)
    }

    /// Short human readable description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Generic => "Generic error",
            Self::FileNotFound => "File not found",
            Self::PermissionDenied => "Permission denied",
            Self::InsufficientSpace => "Insufficient disk space",
            Self::InvalidPath => "Invalid path",
            Self::Network => "Network error",
            Self::Compression => "Compression error",
            Self::Verification => "Verification failed",
            Self::Cancelled => "Operation cancelled",
            Self::InvalidArgument => "Invalid argument",
            Self::OutOfMemory => "Out of memory",
            Self::Timeout => "Operation timed out",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Main error type for ferrocopy operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Unclassified failure
    #[error("{message}")]
    Generic {
        /// Error message
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// Destination volume cannot hold the data
    #[error("Insufficient space at {path}: {required} bytes required, {available} available")]
    InsufficientSpace {
        /// Destination path
        path: PathBuf,
        /// Bytes needed, 0 when unknown
        required: u64,
        /// Bytes available, 0 when unknown
        available: u64,
    },

    /// Invalid or missing path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Network error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Compression error
    #[error("Compression error: {message}")]
    Compression {
        /// Error message describing the compression issue
        message: String,
    },

    /// Checksum mismatch between source and destination
    #[error("Verification failed: {path}")]
    Verification {
        /// Destination path that failed verification
        path: PathBuf,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// A request parameter is invalid
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message describing the argument problem
        message: String,
    },

    /// Allocation or resource exhaustion
    #[error("Out of memory: {message}")]
    OutOfMemory {
        /// Error message describing what could not be allocated
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds after which the operation timed out
        seconds: u64,
    },
}

#[cfg(unix)]
const DISK_FULL_CODES: &[i32] = &[28]; // ENOSPC
#[cfg(windows)]
const DISK_FULL_CODES: &[i32] = &[39, 112]; // ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
#[cfg(not(any(unix, windows)))]
const DISK_FULL_CODES: &[i32] = &[];

impl Error {
    /// Get the numeric error code
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Generic { .. } => ErrorCode::Generic,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::InsufficientSpace { .. } => ErrorCode::InsufficientSpace,
            Self::InvalidPath { .. } => ErrorCode::InvalidPath,
            Self::Network { .. } => ErrorCode::Network,
            Self::Compression { .. } => ErrorCode::Compression,
            Self::Verification { .. } => ErrorCode::Verification,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            Self::Timeout { .. } => ErrorCode::Timeout,
        }
    }

    /// Get the error severity level
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Compression { .. } | Self::Cancelled => ErrorSeverity::Low,
            Self::Generic { .. }
            | Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::Network { .. }
            | Self::Verification { .. }
            | Self::Timeout { .. } => ErrorSeverity::Medium,
            Self::InsufficientSpace { .. }
            | Self::InvalidPath { .. }
            | Self::InvalidArgument { .. } => ErrorSeverity::High,
            Self::OutOfMemory { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether the error was caused by caller input and is detected at submission.
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::InvalidPath { .. })
    }

    /// Whether the error ends the whole operation rather than one file.
    pub const fn is_operation_wide(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Timeout { .. } | Self::InsufficientSpace { .. } | Self::OutOfMemory { .. }
        )
    }

    /// Check if this error is recoverable
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Compression { .. } | Self::Verification { .. } => true,
            Self::Generic { .. }
            | Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::InsufficientSpace { .. }
            | Self::InvalidPath { .. }
            | Self::Cancelled
            | Self::InvalidArgument { .. }
            | Self::OutOfMemory { .. }
            | Self::Timeout { .. } => false,
        }
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(error: &io::Error, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if let Some(raw) = error.raw_os_error() {
            if DISK_FULL_CODES.contains(&raw) {
                return Self::InsufficientSpace {
                    path,
                    required: 0,
                    available: 0,
                };
            }
        }
        match error.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::OutOfMemory => Self::OutOfMemory {
                message: error.to_string(),
            },
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut => Self::Network {
                message: format!("{}: {error}", path.display()),
            },
            _ => Self::Generic {
                message: format!("{}: {error}", path.display()),
            },
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(message: S) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new out-of-memory error
    pub fn out_of_memory<S: Into<String>>(message: S) -> Self {
        Self::OutOfMemory {
            message: message.into(),
        }
    }

    /// The path this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::FileNotFound { path }
            | Self::PermissionDenied { path }
            | Self::InsufficientSpace { path, .. }
            | Self::InvalidPath { path, .. }
            | Self::Verification { path } => Some(path.as_path()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::OutOfMemory => Self::out_of_memory(error.to_string()),
            io::ErrorKind::InvalidInput => Self::invalid_argument(error.to_string()),
            _ => Self::generic(format!("I/O error: {error}")),
        }
    }
}
