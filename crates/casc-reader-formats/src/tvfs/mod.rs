//! TVFS (TACT Virtual File System) roots
//!
//! A TVFS root maps real file paths to the encoding keys of their stored
//! spans. Unlike block manifests it keeps the paths themselves, so its
//! contents can be listed.
//!
//! # Tables
//!
//! - **Path table**: prefix tree of path fragments; each file leaf stores a
//!   VFS table byte offset.
//! - **VFS table**: span lists (`span_count` + spans). Each span has a
//!   content offset, a length and a CFT byte offset.
//! - **Container file table (CFT)**: fixed-stride entries addressed by byte
//!   offset: encoding key, encoded size, optional EST offset, content size.
//! - **Encoding spec table (EST)**: null-terminated `ESpec` strings, present
//!   when `TVFS_FLAG_ENCODING_SPEC` is set.
//!
//! ```rust
//! use casc_reader_formats::tvfs::{TvfsBuilder, TvfsFile};
//! use casc_reader_crypto::EncodingKey;
//!
//! let ekey = EncodingKey::from_prefix(&[0xAB; 9]).expect("key");
//! let mut builder = TvfsBuilder::new();
//! builder.add_file("Data/readme.txt", ekey, 120, 300);
//! let data = builder.build().expect("build");
//!
//! let tvfs = TvfsFile::parse(&data).expect("parse");
//! let file = tvfs.find("data/README.TXT").expect("file");
//! assert_eq!(file.encoding_keys(), vec![ekey]);
//! ```

mod builder;
mod container_table;
mod error;
mod header;
mod path_table;
mod vfs_table;

pub use builder::{SpanSpec, TvfsBuilder};
pub use container_table::ContainerEntry;
pub use error::{TvfsError, TvfsResult};
pub use header::{
    TVFS_FLAG_ENCODING_SPEC, TVFS_FLAG_INCLUDE_CKEY, TVFS_FLAG_PATCH_SUPPORT, TvfsHeader,
    offset_field_size,
};
pub use path_table::{MAX_FOLDER_DEPTH, PathFileEntry, TVFS_FOLDER_NODE, parse_path_table};
pub use vfs_table::{MAX_SPAN_COUNT, VfsSpan, parse_vfs_entry};

use binrw::BinRead;
use casc_reader_crypto::EncodingKey;
use std::io::Cursor;

/// Span of a file resolved to its container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvfsSpan {
    /// Offset of the span within the file
    pub content_offset: u32,
    /// Length of the span
    pub content_length: u32,
    /// Where the span is stored
    pub container: ContainerEntry,
}

/// File of a TVFS root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvfsFileEntry {
    /// Full path, `/` separated
    pub path: String,
    /// Spans in file order
    pub spans: Vec<TvfsSpan>,
}

impl TvfsFileEntry {
    /// Encoding keys of the spans, in file order
    pub fn encoding_keys(&self) -> Vec<EncodingKey> {
        self.spans.iter().map(|s| s.container.encoding_key).collect()
    }

    /// Decoded size of the whole file
    pub fn content_size(&self) -> u64 {
        self.spans
            .iter()
            .map(|s| u64::from(s.content_length))
            .sum()
    }
}

/// Parsed TVFS root
#[derive(Debug, Clone)]
pub struct TvfsFile {
    /// TVFS header
    pub header: TvfsHeader,
    /// Files in path table order
    pub files: Vec<TvfsFileEntry>,
    est_table: Vec<u8>,
}

fn table<'a>(data: &'a [u8], table: &'static str, offset: u32, size: u32) -> TvfsResult<&'a [u8]> {
    let start = offset as usize;
    start
        .checked_add(size as usize)
        .and_then(|end| data.get(start..end))
        .ok_or(TvfsError::InvalidTableRange {
            table,
            offset,
            size,
        })
}

impl TvfsFile {
    /// Parse TVFS from decoded data
    pub fn parse(data: &[u8]) -> TvfsResult<Self> {
        if data.len() >= 4 && data[..4] != *b"TVFS" {
            return Err(TvfsError::InvalidMagic([data[0], data[1], data[2], data[3]]));
        }
        let header = TvfsHeader::read(&mut Cursor::new(data))?;
        header.validate()?;

        let path_data = table(data, "path", header.path_table_offset, header.path_table_size)?;
        let vfs_data = table(data, "VFS", header.vfs_table_offset, header.vfs_table_size)?;
        let cft_data = table(data, "CFT", header.cft_table_offset, header.cft_table_size)?;
        let est_table = match (header.est_table_offset, header.est_table_size) {
            (Some(offset), Some(size)) => table(data, "EST", offset, size)?.to_vec(),
            _ => Vec::new(),
        };

        let cft_offs_size = header.cft_offs_size();
        let mut files = Vec::new();
        for leaf in parse_path_table(path_data)? {
            let spans = parse_vfs_entry(vfs_data, leaf.vfs_offset as usize, cft_offs_size)?
                .into_iter()
                .map(|span| {
                    Ok(TvfsSpan {
                        content_offset: span.content_offset,
                        content_length: span.content_length,
                        container: ContainerEntry::parse_at(
                            cft_data,
                            span.cft_offset as usize,
                            &header,
                        )?,
                    })
                })
                .collect::<TvfsResult<Vec<_>>>()?;
            files.push(TvfsFileEntry {
                path: leaf.path,
                spans,
            });
        }

        Ok(Self {
            header,
            files,
            est_table,
        })
    }

    /// File by path; case-insensitive, either separator
    pub fn find(&self, path: &str) -> Option<&TvfsFileEntry> {
        let wanted = path.replace('\\', "/");
        let wanted = wanted.trim_start_matches('/');
        self.files
            .iter()
            .find(|f| f.path.eq_ignore_ascii_case(wanted))
    }

    /// `ESpec` string of a container entry
    pub fn encoding_spec(&self, entry: &ContainerEntry) -> Option<&str> {
        let start = entry.est_offset? as usize;
        let tail = self.est_table.get(start..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).ok()
    }
}

impl crate::CascFormat<'_> for TvfsFile {
    type Error = TvfsError;

    fn parse(data: &[u8]) -> TvfsResult<Self> {
        TvfsFile::parse(data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ekey(n: u8) -> EncodingKey {
        EncodingKey::from_prefix(&[n; 9]).unwrap()
    }

    fn sample() -> TvfsBuilder {
        let mut builder = TvfsBuilder::new();
        builder
            .add_file("world/maps/azeroth.wdt", ekey(1), 100, 400)
            .add_file("world/maps/kalimdor.wdt", ekey(2), 110, 410)
            .add_file("interface/icons/a.blp", ekey(3), 50, 60)
            .add_file_spans(
                "sound/big.ogg",
                vec![(ekey(4), 1000, 4000), (ekey(5), 500, 2000)],
            )
            .add_file("readme.txt", ekey(6), 10, 10);
        builder
    }

    #[test]
    fn test_build_and_parse() {
        let data = sample().build().expect("build");
        let tvfs = TvfsFile::parse(&data).expect("parse");

        let paths: Vec<&str> = tvfs.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "interface/icons/a.blp",
                "readme.txt",
                "sound/big.ogg",
                "world/maps/azeroth.wdt",
                "world/maps/kalimdor.wdt",
            ]
        );
        assert_eq!(tvfs.header.max_depth, 3);

        let big = tvfs.find("Sound\\Big.ogg").expect("big.ogg");
        assert_eq!(big.encoding_keys(), vec![ekey(4), ekey(5)]);
        assert_eq!(big.content_size(), 6000);
        assert_eq!(big.spans[1].content_offset, 4000);
        assert_eq!(big.spans[1].container.encoded_size, 500);
        assert!(tvfs.find("missing.txt").is_none());
    }

    #[test]
    fn test_encoding_spec_table() {
        let data = sample().with_encoding_spec("b:{*=z}").build().expect("build");
        let tvfs = TvfsFile::parse(&data).expect("parse");
        assert_eq!(tvfs.header.header_size, 46);
        let file = tvfs.find("readme.txt").expect("readme");
        assert_eq!(tvfs.encoding_spec(&file.spans[0].container), Some("b:{*=z}"));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = sample().build().expect("build");
        data[0] = b'X';
        assert!(matches!(TvfsFile::parse(&data), Err(TvfsError::InvalidMagic(_))));
    }

    #[test]
    fn test_rejects_table_past_end() {
        let data = sample().build().expect("build");
        let result = TvfsFile::parse(&data[..data.len() - 1]);
        assert!(matches!(
            result,
            Err(TvfsError::InvalidTableRange { table: "VFS", .. })
        ));
    }
}
