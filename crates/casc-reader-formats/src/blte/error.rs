//! BLTE error types

use thiserror::Error;

/// BLTE-specific error type
#[derive(Debug, Error)]
pub enum BlteError {
    /// Invalid BLTE magic bytes
    #[error("invalid BLTE magic: expected [42 4C 54 45], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Header size does not fit the chunk table or the payload
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),

    /// Chunk table flag byte is not one of the known layouts
    #[error("invalid chunk table flags: 0x{0:02X}")]
    InvalidHeaderFlags(u8),

    /// Invalid chunk count
    #[error("invalid chunk count: {0}")]
    InvalidChunkCount(u32),

    /// Empty chunk encountered
    #[error("empty chunk (zero size)")]
    EmptyChunk,

    /// Payload ended before a declared region
    #[error("truncated payload: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the header declared
        needed: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Bytes left over after the last declared chunk
    #[error("trailing data: chunks end at {expected} bytes, payload has {actual}")]
    TrailingData {
        /// End of the last declared chunk
        expected: usize,
        /// Payload length
        actual: usize,
    },

    /// Unknown compression mode
    #[error("unknown compression mode: 0x{0:02X}")]
    UnknownCompressionMode(u8),

    /// Recognised mode this reader does not decode (encrypted chunks)
    #[error("unsupported compression mode: 0x{0:02X}")]
    UnsupportedCompressionMode(u8),

    /// Checksum mismatch
    #[error("checksum mismatch in chunk {chunk}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Chunk index
        chunk: usize,
        /// Expected checksum
        expected: String,
        /// Actual checksum
        actual: String,
    },

    /// Nested payloads exceeded the configured depth
    #[error("nested BLTE depth limit of {0} exceeded")]
    RecursionLimit(usize),

    /// Compression error (builders only)
    #[error("compression error: {0}")]
    CompressionError(String),

    /// Decompression failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl BlteError {
    /// Whether the payload is well formed but uses a mode this reader refuses
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedCompressionMode(_))
    }

    /// Whether the error comes from the container framing rather than chunk contents
    pub fn is_malformed_header(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic(_)
                | Self::InvalidHeaderSize(_)
                | Self::InvalidHeaderFlags(_)
                | Self::InvalidChunkCount(_)
        )
    }
}

/// Result type for BLTE operations
pub type BlteResult<T> = Result<T, BlteError>;
