//! Post-copy content verification
//!
//! Both files are streamed through the same hasher in bounded chunks; no file
//! is ever held in memory whole. Destinations written with compression are
//! decoded frame by frame before hashing.

use ferrocopy_compression::FrameReader;
use ferrocopy_types::{ChecksumAlgorithm, Error, Result};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

/// Default read size for hashing
pub const DEFAULT_VERIFY_BUFFER: usize = 1024 * 1024;

/// Content digest
#[derive(Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    bytes: Vec<u8>,
}

impl Checksum {
    /// Algorithm that produced the digest
    pub const fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.algorithm, self.to_hex())
    }
}

enum Hasher {
    Blake3(Box<blake3::Hasher>),
    Xxh3(Box<Xxh3>),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            ChecksumAlgorithm::Xxh3 => Self::Xxh3(Box::new(Xxh3::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(hasher) => {
                hasher.update(data);
            }
            Self::Xxh3(hasher) => hasher.update(data),
        }
    }

    fn finish(self) -> Checksum {
        match self {
            Self::Blake3(hasher) => Checksum {
                algorithm: ChecksumAlgorithm::Blake3,
                bytes: hasher.finalize().as_bytes().to_vec(),
            },
            Self::Xxh3(hasher) => Checksum {
                algorithm: ChecksumAlgorithm::Xxh3,
                bytes: hasher.digest128().to_be_bytes().to_vec(),
            },
        }
    }
}

/// Compares source and destination contents by digest
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    algorithm: ChecksumAlgorithm,
    buffer_size: usize,
}

impl Verifier {
    /// Create a verifier using `algorithm`
    pub const fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            algorithm,
            buffer_size: DEFAULT_VERIFY_BUFFER,
        }
    }

    /// Use `buffer_size` byte reads
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Algorithm in use
    pub const fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Digest of a plain file
    pub async fn checksum(&self, path: impl AsRef<Path>) -> Result<Checksum> {
        let path = path.as_ref();
        let mut file = File::open(path).await.map_err(|e| Error::from_io(&e, path))?;
        let mut hasher = Hasher::new(self.algorithm);
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::from_io(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finish())
    }

    /// Digest of the content carried by a compressed frame stream
    pub async fn checksum_framed(&self, path: impl AsRef<Path>) -> Result<Checksum> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| Error::from_io(&e, path))?;
        let mut reader = FrameReader::open(BufReader::with_capacity(self.buffer_size, file)).await?;
        let mut hasher = Hasher::new(self.algorithm);
        while let Some(chunk) = reader.next_chunk().await? {
            hasher.update(&chunk);
        }
        Ok(hasher.finish())
    }

    /// Whether `destination` holds exactly the bytes of `source`
    pub async fn verify(&self, source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<bool> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let source_len = tokio::fs::metadata(source)
            .await
            .map_err(|e| Error::from_io(&e, source))?
            .len();
        let destination_len = tokio::fs::metadata(destination)
            .await
            .map_err(|e| Error::from_io(&e, destination))?
            .len();
        if source_len != destination_len {
            debug!(
                "Size mismatch for {}: {} != {}",
                destination.display(),
                source_len,
                destination_len
            );
            return Ok(false);
        }

        let (expected, actual) = tokio::try_join!(self.checksum(source), self.checksum(destination))?;
        Ok(expected == actual)
    }

    /// Like [`Verifier::verify`] for a compressed destination. A stream that
    /// cannot be decoded does not match.
    pub async fn verify_framed(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<bool> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let expected = self.checksum(source).await?;
        match self.checksum_framed(destination).await {
            Ok(actual) => Ok(expected == actual),
            Err(Error::Compression { message }) => {
                debug!("Undecodable stream {}: {}", destination.display(), message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(ChecksumAlgorithm::default())
    }
}
