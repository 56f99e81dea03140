//! Error types for root manifest parsing and building

use thiserror::Error;

/// Errors that can occur when parsing or building root manifests
#[derive(Error, Debug)]
pub enum RootError {
    /// Extended header declares an impossible size
    #[error("Invalid root header size: {0}")]
    InvalidHeaderSize(u32),

    /// Block ran past the end of the manifest
    #[error("Truncated root block at offset {0}")]
    TruncatedBlock(u64),

    /// Block header with an implausible record count
    #[error("Corrupted block header at offset {offset}: {records} records")]
    CorruptedBlockHeader {
        /// Offset of the block header
        offset: u64,
        /// Declared record count
        records: u32,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for root manifest operations
pub type RootResult<T> = std::result::Result<T, RootError>;
