//! Copy engine for ferrocopy
//!
//! [`CopyEngine`] owns every running operation. Each submitted
//! [`CopyRequest`] becomes an operation addressed by an [`OperationId`]: a
//! generation-checked handle that goes stale once the operation is waited on.
//!
//! An operation moves through its phases (planning, traversing,
//! transferring, verifying, finalizing) on the tokio runtime. Device
//! profiles pick the chunk size and worker count, and progress and
//! per-file errors flow through a bounded event queue.
//!
//! # Examples
//!
//! ```rust
//! use ferrocopy_config::Config;
//! use ferrocopy_engine::{CopyEngine, CopyRequest};
//!
//! # tokio_test::block_on(async {
//! # let dir = tempfile::tempdir()?;
//! # let source = dir.path().join("source.txt");
//! # let destination = dir.path().join("destination.txt");
//! # std::fs::write(&source, b"hello")?;
//! let engine = CopyEngine::new(Config::default())?;
//! let request = CopyRequest::new(&source, &destination).verify_copy(true);
//! let report = engine.execute(request).await?;
//! println!("Copied {} bytes", report.stats.bytes_copied);
//! # assert_eq!(report.stats.bytes_copied, 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod handle;
pub mod reporter;
pub mod task;
pub mod verify;

mod operation;
mod plan;
mod transfer;

pub use engine::CopyEngine;
pub use handle::{Handle, HandleTable};
pub use reporter::{EngineEvent, EventReceiver, Reporter};
pub use task::{CopyRequest, OperationId, OperationReport, OperationStatus};
pub use verify::{Checksum, Verifier};
