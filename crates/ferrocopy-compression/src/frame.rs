//! Framed stream format for compressed destinations
//!
//! A stream starts with a five byte header (`FCZ1` followed by the algorithm
//! id) and carries one frame per source chunk:
//!
//! ```text
//! [kind: u8][raw_len: u32 LE][payload_len: u32 LE][payload]
//! ```
//!
//! `kind` is [`FrameKind::Raw`] when the payload is the chunk itself and
//! [`FrameKind::Compressed`] otherwise. A chunk is stored raw when the
//! compressor fails or does not shrink it, so a stream is always decodable.

use crate::algorithms::{Algorithm, AlgorithmImpl};
use ferrocopy_types::{CompressionAlgorithm, Error, Result};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Stream magic
pub const MAGIC: [u8; 4] = *b"FCZ1";

/// Header length in bytes
pub const HEADER_LEN: usize = MAGIC.len() + 1;

/// Per-frame header length in bytes
pub const FRAME_HEADER_LEN: usize = 9;

/// Largest chunk a single frame may describe
pub const MAX_FRAME_LEN: u32 = 1 << 30;

/// How a frame payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Payload is the chunk
    Raw = 0,
    /// Payload is the compressed chunk
    Compressed = 1,
}

impl FrameKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Raw),
            1 => Some(Self::Compressed),
            _ => None,
        }
    }
}

/// One encoded chunk
#[derive(Debug)]
pub struct EncodedFrame {
    /// Frame bytes, header included
    pub bytes: Vec<u8>,
    /// How the payload was stored
    pub kind: FrameKind,
    /// Compressor failure that forced raw storage, if any
    pub failure: Option<Error>,
}

/// Encodes chunks into frames
pub struct FrameEncoder {
    algorithm: Box<dyn Algorithm>,
    level: i32,
}

impl FrameEncoder {
    /// Create an encoder for `algorithm` at `level`
    pub fn new(algorithm: CompressionAlgorithm, level: i32) -> Self {
        Self {
            algorithm: AlgorithmImpl::create(algorithm),
            level,
        }
    }

    /// Stream header to write before the first frame
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..MAGIC.len()].copy_from_slice(&MAGIC);
        header[MAGIC.len()] = AlgorithmImpl::id(self.algorithm.algorithm_type());
        header
    }

    /// Encode one chunk. Never fails: a compressor error is returned in
    /// [`EncodedFrame::failure`] and the chunk is stored raw.
    pub fn encode(&self, chunk: &[u8]) -> Result<EncodedFrame> {
        let raw_len = frame_len(chunk.len())?;
        let (kind, payload, failure) = match self.algorithm.compress(chunk, self.level) {
            Ok(compressed) if compressed.len() < chunk.len() => {
                (FrameKind::Compressed, compressed, None)
            }
            Ok(_) => (FrameKind::Raw, chunk.to_vec(), None),
            Err(e) => {
                warn!("Compressor failed on a {} byte chunk, storing raw: {}", chunk.len(), e);
                (FrameKind::Raw, chunk.to_vec(), Some(e))
            }
        };

        let payload_len = frame_len(payload.len())?;
        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        bytes.push(kind as u8);
        bytes.extend_from_slice(&raw_len.to_le_bytes());
        bytes.extend_from_slice(&payload_len.to_le_bytes());
        bytes.extend_from_slice(&payload);

        Ok(EncodedFrame {
            bytes,
            kind,
            failure,
        })
    }
}

impl std::fmt::Debug for FrameEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEncoder")
            .field("algorithm", &self.algorithm.algorithm_type())
            .field("level", &self.level)
            .finish()
    }
}

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|&n| n <= MAX_FRAME_LEN)
        .ok_or_else(|| Error::compression(format!("chunk of {} bytes is too large for a frame", len)))
}

/// Decodes a framed stream chunk by chunk
pub struct FrameReader<R> {
    reader: R,
    algorithm: Box<dyn Algorithm>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read and check the stream header
    pub async fn open(mut reader: R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|e| Error::compression(format!("truncated stream header: {}", e)))?;
        if header[..MAGIC.len()] != MAGIC {
            return Err(Error::compression("not a ferrocopy compressed stream"));
        }
        let id = header[MAGIC.len()];
        let algorithm = AlgorithmImpl::from_id(id)
            .ok_or_else(|| Error::compression(format!("unknown compression algorithm id {}", id)))?;
        debug!("Opened {:?} stream", algorithm);
        Ok(Self {
            reader,
            algorithm: AlgorithmImpl::create(algorithm),
        })
    }

    /// Algorithm named by the stream header
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm.algorithm_type()
    }

    /// Next decoded chunk, or `None` at a clean end of stream
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let kind = match self.reader.read_u8().await {
            Ok(kind) => kind,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::compression(format!("stream read failed: {}", e))),
        };
        let kind = FrameKind::from_u8(kind)
            .ok_or_else(|| Error::compression(format!("invalid frame kind {}", kind)))?;
        let raw_len = self.read_len().await?;
        let payload_len = self.read_len().await?;

        match kind {
            FrameKind::Raw if payload_len != raw_len => {
                return Err(Error::compression(format!(
                    "raw frame carries {} bytes for a {} byte chunk",
                    payload_len, raw_len
                )));
            }
            // compressed payloads are only kept when they shrink the chunk
            FrameKind::Compressed if payload_len >= raw_len => {
                return Err(Error::compression(format!(
                    "compressed frame of {} bytes for a {} byte chunk",
                    payload_len, raw_len
                )));
            }
            _ => {}
        }

        // grow with the bytes actually present instead of trusting the header
        let mut payload = Vec::new();
        let read = (&mut self.reader)
            .take(u64::from(payload_len))
            .read_to_end(&mut payload)
            .await
            .map_err(|e| Error::compression(format!("stream read failed: {}", e)))?;
        if read != payload_len as usize {
            return Err(Error::compression(format!(
                "truncated frame: {} of {} payload bytes",
                read, payload_len
            )));
        }

        let chunk = match kind {
            FrameKind::Raw => payload,
            FrameKind::Compressed => self.algorithm.decompress(&payload, raw_len as usize)?,
        };
        if chunk.len() != raw_len as usize {
            return Err(Error::compression(format!(
                "frame decoded to {} bytes, expected {}",
                chunk.len(),
                raw_len
            )));
        }
        Ok(Some(chunk))
    }

    /// Decode the remainder of the stream into memory
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    async fn read_len(&mut self) -> Result<u32> {
        let len = self
            .reader
            .read_u32_le()
            .await
            .map_err(|e| Error::compression(format!("truncated frame header: {}", e)))?;
        if len > MAX_FRAME_LEN {
            return Err(Error::compression(format!("frame length {} out of range", len)));
        }
        Ok(len)
    }
}
