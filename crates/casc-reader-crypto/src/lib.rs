//! Key types and lookup hashes for local CASC storage
//!
//! CASC addresses everything by hash. This crate holds the small set of
//! primitives the rest of the workspace agrees on:
//!
//! - **Keys**: [`ContentKey`] (MD5 of the decoded file), [`EncodingKey`]
//!   (MD5 of the stored, block-encoded payload) and [`FileDataId`]
//! - **Hashing**: Bob Jenkins' lookup3 (`hashlittle`, `hashlittle2`) used for
//!   root manifest name hashes and index header guards
//!
//! # Examples
//!
//! ```
//! use casc_reader_crypto::md5::ContentKey;
//!
//! let key = ContentKey::from_data(b"Hello, World!");
//! assert_eq!(key.to_hex(), "65a8e27d8879283831b664bd8b7f0ad4");
//! ```
//!
//! ```
//! use casc_reader_crypto::jenkins::Jenkins96;
//!
//! // Paths are normalised before hashing, so both spellings agree
//! let a = Jenkins96::hash_path("Interface/Icons/Foo.blp");
//! let b = Jenkins96::hash_path("INTERFACE\\ICONS\\FOO.BLP");
//! assert_eq!(a, b);
//! ```

#![warn(missing_docs)]

pub mod jenkins;
pub mod md5;

pub use jenkins::{Jenkins96, hashlittle, hashlittle2};
pub use md5::{ContentKey, EncodingKey, FileDataId};
