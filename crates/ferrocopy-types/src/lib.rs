//! Core type system and error handling for ferrocopy
//!
//! This crate provides the foundational types shared by every ferrocopy crate:
//!
//! - **Error handling**: the closed error taxonomy and its stable numeric codes
//! - **Core types**: copy modes, device snapshots, statistics and engine events
//! - **Traits**: observer and cancellation seams
//! - **Tuning values**: validated buffer sizes and thread counts
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrocopy_types::{CopyStats, Error, ErrorCode, Result};
//!
//! fn summarize(stats: &CopyStats) -> Result<u64> {
//!     if stats.errors > 0 {
//!         return Err(Error::generic("copy finished with errors"));
//!     }
//!     Ok(stats.bytes_copied)
//! }
//!
//! assert_eq!(summarize(&CopyStats::new()).unwrap(), 0);
//! assert_eq!(Error::Cancelled.code(), ErrorCode::Cancelled);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use config::{BufferSize, ThreadCount};
pub use error::{Error, ErrorCode, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;
