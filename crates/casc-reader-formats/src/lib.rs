//! File format parsers for CASC local storage
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many CASC-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate parses the data files a CASC storage reader needs after the
//! index and archive layers have produced raw bytes. Builders exist for the
//! formats whose layout tests need to construct.
//!
//! # Supported Formats
//!
//! - **BLTE**: chunked container for every stored payload
//! - **BPSV**: pipe-separated tables such as `.build.info`
//! - **Config**: build configuration files (`key = value`)
//! - **Encoding**: content key to encoding key table
//! - **Root**: block manifests keyed by `FileDataId` and name hash
//! - **TVFS**: virtual file system roots keyed by path
//! - **Listfile**: `FileDataId;path` name lists

#![warn(missing_docs)]

/// BLTE chunked container format
pub mod blte;
/// Blizzard pipe-separated values
pub mod bpsv;
/// Build configuration files
pub mod config;
/// Encoding table: content key to encoding keys
pub mod encoding;
pub mod listfile;
/// Block root manifests (MFST/TSFM and headerless)
pub mod root;
/// TVFS (TACT Virtual File System) roots
pub mod tvfs;

/// Common parsing entry point shared by the binary formats
///
/// The lifetime lets zero-copy formats such as
/// [`BlteFile`](blte::BlteFile) borrow from the input.
pub trait CascFormat<'a>: Sized {
    /// Error produced when the input is malformed
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse from bytes
    fn parse(data: &'a [u8]) -> Result<Self, Self::Error>;
}
