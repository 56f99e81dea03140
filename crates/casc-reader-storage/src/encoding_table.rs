//! Content key to storage key table
//!
//! Built once from a decoded encoding file. A content key can have several
//! storage keys; the first one is canonical.

use crate::Result;
use casc_reader_crypto::{ContentKey, EncodingKey};
use casc_reader_formats::encoding::EncodingFile;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct EncodedInfo {
    espec: Option<String>,
    encoded_size: u64,
}

/// Lookup table over an encoding file
#[derive(Debug, Clone, Default)]
pub struct EncodingTable {
    content: HashMap<ContentKey, (u64, Vec<EncodingKey>)>,
    encoded: HashMap<EncodingKey, EncodedInfo>,
}

impl EncodingTable {
    /// Parse a decoded encoding file
    ///
    /// `verify_pages` checks each page against its MD5 in the page index.
    pub fn parse(data: &[u8], verify_pages: bool) -> Result<Self> {
        let file = EncodingFile::parse_with_options(data, verify_pages)?;
        Ok(Self::from_file(&file))
    }

    /// Index an already parsed encoding file
    pub fn from_file(file: &EncodingFile) -> Self {
        let mut content = HashMap::with_capacity(file.ckey_entries.len());
        for entry in &file.ckey_entries {
            content
                .entry(entry.content_key)
                .or_insert_with(|| (entry.file_size, entry.encoding_keys.clone()));
        }

        let encoded = file
            .ekey_entries
            .iter()
            .map(|entry| {
                let info = EncodedInfo {
                    espec: file.espec_for(entry).map(str::to_string),
                    encoded_size: entry.file_size,
                };
                (entry.encoding_key, info)
            })
            .collect();

        Self { content, encoded }
    }

    /// Every storage key of a content key
    pub fn lookup(&self, content_key: &ContentKey) -> Option<&[EncodingKey]> {
        self.content
            .get(content_key)
            .map(|(_, keys)| keys.as_slice())
    }

    /// Canonical storage key of a content key
    pub fn storage_key(&self, content_key: &ContentKey) -> Option<EncodingKey> {
        self.lookup(content_key)
            .and_then(|keys| keys.first())
            .copied()
    }

    /// Decoded size of a content key
    pub fn content_size(&self, content_key: &ContentKey) -> Option<u64> {
        self.content.get(content_key).map(|(size, _)| *size)
    }

    /// `ESpec` of a storage key
    pub fn encoding_spec(&self, encoding_key: &EncodingKey) -> Option<&str> {
        self.encoded.get(encoding_key)?.espec.as_deref()
    }

    /// Stored size of a storage key
    pub fn encoded_size(&self, encoding_key: &EncodingKey) -> Option<u64> {
        self.encoded.get(encoding_key).map(|info| info.encoded_size)
    }

    /// Number of content keys
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the table has no content keys
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use casc_reader_formats::encoding::EncodingBuilder;
    use pretty_assertions::assert_eq;

    fn ckey(n: u8) -> ContentKey {
        ContentKey::from_bytes([n; 16])
    }

    fn ekey(n: u8) -> EncodingKey {
        EncodingKey::from_bytes([n; 16])
    }

    fn sample() -> Vec<u8> {
        EncodingBuilder::new()
            .add_content(ckey(1), 100, vec![ekey(0x11), ekey(0x12)])
            .add_content(ckey(2), 200, vec![ekey(0x21)])
            .add_encoded(ekey(0x11), "z", 60)
            .add_encoded(ekey(0x12), "n", 100)
            .add_encoded(ekey(0x21), "b:{*=z}", 90)
            .build()
            .expect("build")
    }

    #[test]
    fn test_lookups() {
        let table = EncodingTable::parse(&sample(), true).expect("parse");

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(&ckey(1)), Some(&[ekey(0x11), ekey(0x12)][..]));
        assert_eq!(table.storage_key(&ckey(2)), Some(ekey(0x21)));
        assert_eq!(table.content_size(&ckey(2)), Some(200));
        assert_eq!(table.encoding_spec(&ekey(0x21)), Some("b:{*=z}"));
        assert_eq!(table.encoded_size(&ekey(0x12)), Some(100));
        assert!(table.storage_key(&ckey(3)).is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = sample();
        data[0] = b'X';
        assert!(EncodingTable::parse(&data, false).is_err());
    }
}
