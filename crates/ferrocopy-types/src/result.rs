//! Result type alias for ferrocopy operations

use crate::Error;

/// Result type alias for ferrocopy operations
pub type Result<T> = std::result::Result<T, Error>;
