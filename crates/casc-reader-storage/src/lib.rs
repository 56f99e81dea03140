//! Read-only access to local CASC storage.
//!
//! A request travels through a chain of lookups before any bytes come back:
//!
//! 1. **Roots** map a path or `FileDataId` to a content key
//! 2. **Encoding table** maps the content key to a storage (encoding) key
//! 3. **Index files** map the storage key to an archive, offset and size
//! 4. **Archives** (`Data/data/data.NNN`) hold the BLTE payload at that range
//!
//! [`StorageReader`] drives the whole chain. The build configuration naming
//! the encoding table and the roots is found through `.build.info`.
//!
//! # Storage Layout
//!
//! ```text
//! <install>/.build.info            build identity table (or Data/.build.info)
//! <install>/Data/config/xx/yy/key  build configuration blobs
//! <install>/Data/data/*.idx        index files
//! <install>/Data/data/data.NNN     numbered archives
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use casc_reader_storage::{FileLocator, StorageConfig, StorageReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("/path/to/World of Warcraft").with_product("wow");
//! let reader = StorageReader::open(config).await?;
//!
//! let bytes = reader.resolve(&FileLocator::parse("interface/framexml/framexml.toc"))?;
//! println!("{} bytes, {} index entries", bytes.len(), reader.stats().index_entries);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use casc_reader_formats::blte::BlteError;
use casc_reader_formats::bpsv::BpsvError;
use casc_reader_formats::config::ConfigError;
use casc_reader_formats::encoding::EncodingError;
use casc_reader_formats::root::RootError;
use casc_reader_formats::tvfs::TvfsError;
use thiserror::Error;

// Numbered data archives
pub mod archive;

// .build.info and build configuration
pub mod build_manifest;

// Configuration
pub mod config;

// Content key to storage key table
pub mod encoding_table;

// Index files (.idx)
pub mod index;

// Lifecycle events
pub mod observer;

// Facade
pub mod reader;

// Merged roots
pub mod root_table;

pub use archive::ArchiveDataReader;
pub use build_manifest::BuildManifest;
pub use config::StorageConfig;
pub use encoding_table::EncodingTable;
pub use index::{IndexEntry, IndexKey, IndexLayout, IndexLoadSummary, IndexStore};
pub use observer::{NoopObserver, StorageObserver, TracingObserver};
pub use reader::{FileLocator, StorageReader, StorageState, StorageStats};
pub use root_table::{RootMergeSummary, RootTable, RootTarget};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key, path or id is absent from local storage.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A file carried an unrecognised magic, version or header.
    #[error("Malformed header in {source_name}: {reason}")]
    MalformedHeader {
        /// File or blob the header belongs to
        source_name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Payload uses a chunk encoding this reader does not decode.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Read range lies outside the archive file.
    #[error(
        "Read outside archive data.{archive_id:03}: offset {offset} + size {size} > {archive_size}"
    )]
    OutOfBounds {
        /// Archive number
        archive_id: u16,
        /// Requested offset
        offset: u64,
        /// Requested size
        size: u32,
        /// Size of the archive file
        archive_size: u64,
    },

    /// Extracted bytes do not hash to the requested content key.
    #[error("Content mismatch for {expected}: got {actual}")]
    ChecksumMismatch {
        /// Content key requested (hex)
        expected: String,
        /// MD5 of the extracted bytes (hex)
        actual: String,
    },

    /// BLTE payload error.
    #[error("BLTE error: {0}")]
    Blte(BlteError),

    /// Encoding table error.
    #[error("Encoding table error: {0}")]
    Encoding(#[from] EncodingError),

    /// Root manifest error.
    #[error("Root error: {0}")]
    Root(#[from] RootError),

    /// TVFS root error.
    #[error("TVFS error: {0}")]
    Tvfs(#[from] TvfsError),

    /// Build identity table error.
    #[error("BPSV error: {0}")]
    Bpsv(#[from] BpsvError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The reader lacks a layer the operation needs.
    #[error("Not ready: {0}")]
    NotReady(String),
}

impl StorageError {
    /// Whether this is the expected "absent" outcome rather than a failure
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<BlteError> for StorageError {
    fn from(error: BlteError) -> Self {
        if error.is_unsupported() {
            Self::UnsupportedEncoding(error.to_string())
        } else if error.is_malformed_header() {
            Self::malformed("BLTE payload", error.to_string())
        } else {
            Self::Blte(error)
        }
    }
}

impl From<ConfigError> for StorageError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory name (installation root).
pub const DEFAULT_DATA_DIR: &str = "Data";

/// Data subdirectory where both `.idx` and `.data` files live.
pub const DATA_DIR: &str = "data";

/// Build configuration subdirectory of `Data/`.
pub const CONFIG_DIR: &str = "config";

/// `.build.info` filename.
pub const BUILD_INFO_FILE: &str = ".build.info";

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blte_error_mapping() {
        let unsupported: StorageError = BlteError::UnsupportedCompressionMode(b'E').into();
        assert!(matches!(unsupported, StorageError::UnsupportedEncoding(_)));

        let magic: StorageError = BlteError::InvalidMagic(*b"XXXX").into();
        assert!(matches!(magic, StorageError::MalformedHeader { .. }));

        let other: StorageError = BlteError::EmptyChunk.into();
        assert!(matches!(other, StorageError::Blte(_)));
        assert!(!other.is_not_found());
        assert!(StorageError::NotFound("x".into()).is_not_found());
    }
}
