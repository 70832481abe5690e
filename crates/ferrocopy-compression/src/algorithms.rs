//! Compression algorithm implementations
//!
//! Each algorithm compresses one chunk at a time. Chunks are independent so a
//! failure on one chunk never poisons the rest of the stream.

use ferrocopy_types::{CompressionAlgorithm, Error, Result};

/// Trait for compression algorithm implementations
pub trait Algorithm: Send + Sync {
    /// Compress one chunk
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>>;

    /// Decompress one chunk whose original length is known
    fn decompress(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>>;

    /// Get the algorithm type
    fn algorithm_type(&self) -> CompressionAlgorithm;
}

/// Algorithm implementation factory
pub struct AlgorithmImpl;

impl AlgorithmImpl {
    /// Create an algorithm implementation for the specified type
    pub fn create(algorithm: CompressionAlgorithm) -> Box<dyn Algorithm> {
        match algorithm {
            CompressionAlgorithm::Zstd => Box::new(ZstdAlgorithm),
            CompressionAlgorithm::Lz4 => Box::new(Lz4Algorithm),
        }
    }

    /// Stable identifier written into stream headers
    pub const fn id(algorithm: CompressionAlgorithm) -> u8 {
        match algorithm {
            CompressionAlgorithm::Zstd => 1,
            CompressionAlgorithm::Lz4 => 2,
        }
    }

    /// Inverse of [`AlgorithmImpl::id`]
    pub const fn from_id(id: u8) -> Option<CompressionAlgorithm> {
        match id {
            1 => Some(CompressionAlgorithm::Zstd),
            2 => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }
}

/// Zstandard compression implementation
#[derive(Debug, Clone, Copy)]
pub struct ZstdAlgorithm;

impl Algorithm for ZstdAlgorithm {
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        zstd::bulk::compress(data, level)
            .map_err(|e| Error::compression(format!("Zstd compression failed: {}", e)))
    }

    fn decompress(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        zstd::bulk::decompress(data, original_len)
            .map_err(|e| Error::compression(format!("Zstd decompression failed: {}", e)))
    }

    fn algorithm_type(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }
}

/// LZ4 compression implementation
#[derive(Debug, Clone, Copy)]
pub struct Lz4Algorithm;

impl Algorithm for Lz4Algorithm {
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress(data))
    }

    fn decompress(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        lz4_flex::decompress(data, original_len)
            .map_err(|e| Error::compression(format!("LZ4 decompression failed: {}", e)))
    }

    fn algorithm_type(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CompressionAlgorithm::Zstd)]
    #[case(CompressionAlgorithm::Lz4)]
    fn test_chunk_round_trip(#[case] algorithm: CompressionAlgorithm) {
        let engine = AlgorithmImpl::create(algorithm);
        let data = b"ferrocopy ".repeat(500);
        let compressed = engine.compress(&data, 3).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(engine.decompress(&compressed, data.len()).unwrap(), data);
        assert_eq!(engine.algorithm_type(), algorithm);
    }

    #[rstest]
    #[case(CompressionAlgorithm::Zstd)]
    #[case(CompressionAlgorithm::Lz4)]
    fn test_garbage_fails_to_decompress(#[case] algorithm: CompressionAlgorithm) {
        let engine = AlgorithmImpl::create(algorithm);
        assert!(engine.decompress(&[0xff; 32], 1024).is_err());
    }

    #[test]
    fn test_ids() {
        for algorithm in [CompressionAlgorithm::Zstd, CompressionAlgorithm::Lz4] {
            assert_eq!(AlgorithmImpl::from_id(AlgorithmImpl::id(algorithm)), Some(algorithm));
        }
        assert_eq!(AlgorithmImpl::from_id(0), None);
    }
}
