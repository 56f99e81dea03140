//! Builder for synthetic encoding tables
//!
//! ```rust
//! use casc_reader_formats::encoding::{EncodingBuilder, EncodingFile};
//! use casc_reader_crypto::{ContentKey, EncodingKey};
//!
//! let ckey = ContentKey::from_bytes([1u8; 16]);
//! let ekey = EncodingKey::from_bytes([2u8; 16]);
//!
//! let data = EncodingBuilder::new()
//!     .add_content(ckey, 1024, vec![ekey])
//!     .add_encoded(ekey, "z", 512)
//!     .build()
//!     .expect("build encoding table");
//!
//! let file = EncodingFile::parse(&data).expect("parse");
//! assert_eq!(file.find_content(&ckey).unwrap().encoding_keys[0], ekey);
//! ```

use crate::encoding::entry::{CKeyPageEntry, EKeyPageEntry, KeySizes};
use crate::encoding::error::{EncodingError, EncodingResult};
use crate::encoding::{ESpecTable, EncodingHeader};
use binrw::BinWrite;
use casc_reader_crypto::{ContentKey, EncodingKey};
use std::io::Cursor;

/// Builder for creating encoding tables
#[derive(Debug, Clone)]
pub struct EncodingBuilder {
    ckey_entries: Vec<CKeyPageEntry>,
    ekey_entries: Vec<(EncodingKey, String, u64)>,
    ckey_page_size_kb: u16,
    ekey_page_size_kb: u16,
    trailing_espec: Option<String>,
}

impl EncodingBuilder {
    /// Create a new encoding builder with 4 KiB pages
    pub fn new() -> Self {
        Self {
            ckey_entries: Vec::new(),
            ekey_entries: Vec::new(),
            ckey_page_size_kb: 4,
            ekey_page_size_kb: 4,
            trailing_espec: None,
        }
    }

    /// Set page sizes in KiB
    #[must_use]
    pub fn with_page_sizes(mut self, ckey_page_size_kb: u16, ekey_page_size_kb: u16) -> Self {
        self.ckey_page_size_kb = ckey_page_size_kb;
        self.ekey_page_size_kb = ekey_page_size_kb;
        self
    }

    /// Append a self-describing `ESpec` after the last page
    #[must_use]
    pub fn with_trailing_espec(mut self, espec: &str) -> Self {
        self.trailing_espec = Some(espec.to_string());
        self
    }

    /// Map a content key to its encoding keys
    #[must_use]
    pub fn add_content(
        mut self,
        content_key: ContentKey,
        file_size: u64,
        encoding_keys: Vec<EncodingKey>,
    ) -> Self {
        self.ckey_entries.push(CKeyPageEntry {
            file_size,
            content_key,
            encoding_keys,
        });
        self
    }

    /// Describe how an encoding key is stored
    #[must_use]
    pub fn add_encoded(mut self, encoding_key: EncodingKey, espec: &str, encoded_size: u64) -> Self {
        self.ekey_entries
            .push((encoding_key, espec.to_string(), encoded_size));
        self
    }

    /// Serialise the table
    pub fn build(mut self) -> EncodingResult<Vec<u8>> {
        let sizes = KeySizes::default();

        self.ckey_entries.sort_by(|a, b| a.content_key.cmp(&b.content_key));
        self.ekey_entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut espec_table = ESpecTable::default();
        let ekey_entries: Vec<EKeyPageEntry> = self
            .ekey_entries
            .iter()
            .map(|(key, espec, size)| EKeyPageEntry {
                encoding_key: *key,
                espec_index: espec_table.intern(espec),
                file_size: *size,
            })
            .collect();
        if espec_table.entries.is_empty() {
            espec_table.intern("n");
        }
        let espec_block = espec_table.build();

        let ckey_page_size = self.ckey_page_size_kb as usize * 1024;
        let ekey_page_size = self.ekey_page_size_kb as usize * 1024;

        let ckey_pages = paginate(
            &self.ckey_entries,
            ckey_page_size,
            |e| e.encoded_len(sizes),
            |e| *e.content_key.as_bytes(),
            |e, w| e.write_options(w, binrw::Endian::Big, (sizes,)),
        )?;
        let ekey_pages = paginate(
            &ekey_entries,
            ekey_page_size,
            |_| EKeyPageEntry::encoded_len(sizes),
            |e| *e.encoding_key.as_bytes(),
            |e, w| e.write_options(w, binrw::Endian::Big, (sizes,)),
        )?;

        let header = EncodingHeader {
            ckey_page_size_kb: self.ckey_page_size_kb,
            ekey_page_size_kb: self.ekey_page_size_kb,
            ckey_page_count: ckey_pages.len() as u32,
            ekey_page_count: ekey_pages.len() as u32,
            espec_block_size: espec_block.len() as u32,
            ..EncodingHeader::new()
        };

        let mut output = Vec::with_capacity(header.data_size());
        header.write(&mut Cursor::new(&mut output))?;
        output.extend_from_slice(&espec_block);
        for pages in [&ckey_pages, &ekey_pages] {
            for (first_key, page) in pages {
                output.extend_from_slice(first_key);
                output.extend_from_slice(&md5::compute(page).0);
            }
            for (_, page) in pages {
                output.extend_from_slice(page);
            }
        }
        if let Some(espec) = &self.trailing_espec {
            output.extend_from_slice(espec.as_bytes());
        }

        Ok(output)
    }
}

impl Default for EncodingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

type PageWriter<'w> = Cursor<&'w mut Vec<u8>>;

// Packs entries into zero-padded pages; always yields at least one page
fn paginate<T>(
    entries: &[T],
    page_size: usize,
    len: impl Fn(&T) -> usize,
    first_key: impl Fn(&T) -> [u8; 16],
    write: impl Fn(&T, &mut PageWriter<'_>) -> binrw::BinResult<()>,
) -> EncodingResult<Vec<([u8; 16], Vec<u8>)>> {
    let mut pages: Vec<([u8; 16], Vec<u8>)> = Vec::new();
    let mut current: Vec<u8> = Vec::with_capacity(page_size);
    let mut current_first = None;

    for entry in entries {
        let entry_len = len(entry);
        if entry_len > page_size {
            return Err(EncodingError::EntryOverflow);
        }
        if current.len() + entry_len > page_size {
            current.resize(page_size, 0);
            pages.push((current_first.take().unwrap_or([0; 16]), current));
            current = Vec::with_capacity(page_size);
        }
        if current_first.is_none() {
            current_first = Some(first_key(entry));
        }
        let position = current.len() as u64;
        let mut cursor = Cursor::new(&mut current);
        cursor.set_position(position);
        write(entry, &mut cursor)?;
    }

    if !current.is_empty() || pages.is_empty() {
        current.resize(page_size, 0);
        pages.push((current_first.unwrap_or([0; 16]), current));
    }

    Ok(pages)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoding::EncodingFile;

    #[test]
    fn test_entries_span_pages() {
        let mut builder = EncodingBuilder::new().with_page_sizes(1, 1);
        for n in 1..=100u8 {
            let ekey = EncodingKey::from_bytes([n; 16]);
            builder = builder
                .add_content(ContentKey::from_bytes([n; 16]), u64::from(n), vec![ekey])
                .add_encoded(ekey, if n % 2 == 1 { "z" } else { "n" }, u64::from(n) + 1);
        }
        let data = builder.with_trailing_espec("b:{*=z}").build().expect("build");
        let file = EncodingFile::parse_with_options(&data, true).expect("parse");

        // 38 byte content entries, 26 per KiB page
        assert_eq!(file.header.ckey_page_count, 4);
        assert_eq!(file.ckey_entries.len(), 100);
        assert_eq!(file.ekey_entries.len(), 100);
        assert_eq!(file.ckey_index[1].first_key, [27u8; 16]);
        assert_eq!(file.espec_table.entries, vec!["z", "n"]);
        assert_eq!(file.trailing_espec.as_deref(), Some("b:{*=z}"));
    }

    #[test]
    fn test_empty_table_still_parses() {
        let data = EncodingBuilder::new().build().expect("build");
        let file = EncodingFile::parse(&data).expect("parse");
        assert!(file.ckey_entries.is_empty());
        assert!(file.ekey_entries.is_empty());
    }
}
