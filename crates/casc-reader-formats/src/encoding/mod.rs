//! Encoding table: content key to encoding key mappings
//!
//! The table is itself stored BLTE encoded; these parsers take the decoded
//! bytes.

mod builder;
mod entry;
mod error;
mod espec;
mod file;
mod header;

pub use builder::EncodingBuilder;
pub use entry::{CKeyPageEntry, EKeyPageEntry, KeySizes};
pub use error::{EncodingError, EncodingResult};
pub use espec::ESpecTable;
pub use file::{EncodingFile, PageIndexEntry};
pub use header::{ENCODING_MAGIC, EncodingHeader};
