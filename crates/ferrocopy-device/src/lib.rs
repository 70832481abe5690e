//! Storage device profiling and transfer tuning for ferrocopy
//!
//! This crate answers two questions before any byte is copied:
//!
//! - **What is behind this path?** [`DeviceProfiler`] classifies the backing
//!   device (HDD, SSD, network, RAM disk), and reports its filesystem,
//!   capacity and theoretical throughput.
//! - **How should we copy?** [`BufferStrategy`] turns two profiles plus the
//!   caller's hints into a buffer size and worker count.
//!
//! # Examples
//!
//! ```rust
//! use ferrocopy_device::{BufferStrategy, DeviceProfiler, TransferHints};
//!
//! # tokio_test::block_on(async {
//! let profiler = DeviceProfiler::new();
//! let source = profiler.profile(".").await?;
//! let destination = profiler.profile(std::env::temp_dir()).await?;
//!
//! let decision = BufferStrategy::default().choose(&source, &destination, TransferHints::default())?;
//! assert!(decision.thread_count.get() >= 1);
//! # Ok::<(), ferrocopy_types::Error>(())
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod profiler;
pub mod strategy;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub mod unix;

pub use cache::{CacheStats, DeviceCache};
pub use profiler::DeviceProfiler;
pub use strategy::{bottleneck, BufferStrategy, StrategyDecision, TransferHints};
