//! Error types for encoding table parsing

use thiserror::Error;

/// Errors that can occur when working with encoding tables
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum EncodingError {
    #[error("Invalid magic: expected 'EN', got {0:?}")]
    InvalidMagic([u8; 2]),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("Page {page} checksum mismatch in {table} table")]
    ChecksumMismatch { table: &'static str, page: usize },

    #[error("Encoding table truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Invalid flags: must be 0, got {0}")]
    InvalidFlags(u8),

    #[error("Invalid {field} hash size: expected 1..=16, got {value}")]
    InvalidHashSize {
        /// Which hash size field is invalid
        field: &'static str,
        /// The invalid value
        value: u8,
    },

    #[error("Invalid {field} page count: must be > 0, got {value}")]
    InvalidPageCount {
        /// Which page count field is invalid
        field: &'static str,
        /// The invalid value
        value: u32,
    },

    #[error("Invalid ESpec block size: must be > 0, got {0}")]
    InvalidESpecBlockSize(u32),

    #[error("Entry does not fit its page")]
    EntryOverflow,
}

/// Result type for encoding table operations
pub type EncodingResult<T> = Result<T, EncodingError>;
