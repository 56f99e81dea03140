//! TVFS error types

use thiserror::Error;

/// TVFS-specific error type
#[derive(Debug, Error)]
pub enum TvfsError {
    /// Invalid TVFS magic bytes
    #[error("invalid TVFS magic: expected 'TVFS', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported TVFS version
    #[error("unsupported TVFS version: {0}")]
    UnsupportedVersion(u8),

    /// Header size does not match the flags
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u8),

    /// Encoding key size outside 1..=16
    #[error("invalid encoding key size: {0}")]
    InvalidKeySize(u8),

    /// A table lies outside the blob
    #[error("{table} table out of range: offset {offset}, size {size}")]
    InvalidTableRange {
        /// Table name
        table: &'static str,
        /// Declared offset
        offset: u32,
        /// Declared size
        size: u32,
    },

    /// Path table truncated
    #[error("path table truncated at offset {0}")]
    PathTableTruncated(usize),

    /// Folder node extends past its parent
    #[error("invalid folder size {size} at offset {offset}")]
    InvalidFolderSize {
        /// Byte offset of the folder contents
        offset: usize,
        /// Declared folder size
        size: u32,
    },

    /// Folders nested past the parser limit
    #[error("folder nesting exceeds {limit} levels at offset {offset}")]
    FolderTooDeep {
        /// Byte offset of the folder contents
        offset: usize,
        /// Maximum nesting depth
        limit: usize,
    },

    /// Invalid VFS span count
    #[error("invalid VFS span count {count} at offset {offset}")]
    InvalidSpanCount {
        /// Span count found
        count: u8,
        /// Byte offset
        offset: usize,
    },

    /// VFS table truncated
    #[error("VFS table truncated at offset {0}")]
    VfsTableTruncated(usize),

    /// Container file table truncated
    #[error("container file table truncated at offset {0}")]
    CftTableTruncated(usize),

    /// Path exceeds the 255-byte node name limit
    #[error("path component too long: {0}")]
    NameTooLong(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for TVFS operations
pub type TvfsResult<T> = Result<T, TvfsError>;
