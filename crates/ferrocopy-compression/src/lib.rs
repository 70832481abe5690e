//! Chunked compression for ferrocopy
//!
//! Destinations written with compression enabled use the framed format in
//! [`frame`]: every source chunk becomes one self-describing frame, so the
//! stream can be decoded incrementally and a chunk the compressor cannot
//! handle is simply stored raw.
//!
//! # Supported Algorithms
//!
//! - **Zstandard (zstd)**: High compression ratio with good speed
//! - **LZ4**: Ultra-fast compression with moderate ratio
//!
//! # Examples
//!
//! ```rust
//! use ferrocopy_compression::{FrameEncoder, FrameReader};
//! use ferrocopy_types::CompressionAlgorithm;
//!
//! # tokio_test::block_on(async {
//! let encoder = FrameEncoder::new(CompressionAlgorithm::Zstd, 3);
//! let data = b"Hello, world! This is test data for compression.";
//!
//! let mut stream = encoder.header().to_vec();
//! stream.extend_from_slice(&encoder.encode(data)?.bytes);
//!
//! let mut reader = FrameReader::open(stream.as_slice()).await?;
//! assert_eq!(reader.read_to_end().await?, data);
//! # Ok::<(), ferrocopy_types::Error>(())
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod frame;

pub use algorithms::{Algorithm, AlgorithmImpl, Lz4Algorithm, ZstdAlgorithm};
pub use frame::{EncodedFrame, FrameEncoder, FrameKind, FrameReader};
