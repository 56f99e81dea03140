//! Block root manifests
//!
//! A block manifest maps `FileDataId`s and path name hashes to content keys.
//! Records are grouped into blocks that share content and locale flags.
//!
//! | Layout | Header | Block header | Record arrays |
//! |--------|--------|--------------|---------------|
//! | `V1` | none | 12 bytes | ids, then key + name hash interleaved |
//! | `V2` | `MFST`/`TSFM`, 12 bytes | 12 bytes | ids, keys, name hashes |
//! | `V3` | extended, version 2..3 | 17 bytes | ids, keys, name hashes |
//! | `V4` | extended, version 4+ | 18 bytes (40-bit flags) | ids, keys, name hashes |
//!
//! Name hashes are the 64-bit Jenkins96 hash of the upper-cased,
//! backslash-separated path. Blocks flagged `NO_NAME_HASH` omit them.
//!
//! ```rust
//! use casc_reader_formats::root::{ContentFlags, LocaleFlags, RootBuilder, RootFile, RootVersion};
//! use casc_reader_crypto::{ContentKey, FileDataId};
//!
//! let mut builder = RootBuilder::new(RootVersion::V2);
//! builder.add_file(
//!     FileDataId::new(100),
//!     ContentKey::from_bytes([1; 16]),
//!     Some("Interface/Icons/INV_Misc_QuestionMark.blp"),
//!     LocaleFlags::new(LocaleFlags::ENUS),
//!     ContentFlags::new(ContentFlags::INSTALL),
//! );
//! let data = builder.build().expect("build");
//!
//! let root = RootFile::parse(&data).expect("parse");
//! assert_eq!(
//!     root.find_by_id(FileDataId::new(100)),
//!     Some(ContentKey::from_bytes([1; 16]))
//! );
//! ```

mod block;
mod builder;
mod error;
mod file;
mod flags;
mod version;

pub use block::{MAX_BLOCK_RECORDS, RootBlock, RootRecord};
pub use builder::RootBuilder;
pub use error::{RootError, RootResult};
pub use file::RootFile;
pub use flags::{ContentFlags, LocaleFlags};
pub use version::{RootHeader, RootMagic, RootVersion};
