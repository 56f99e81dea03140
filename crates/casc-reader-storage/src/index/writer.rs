//! Index file writer for synthetic storages
//!
//! Produces files in all three layouts so loaders and tests can be exercised
//! without a game installation.

use super::layout::{GUARDED_OFFSET_MASK, IndexLayout, VARIABLE_HEADER_BLOCK_SIZE, align16};
use casc_reader_crypto::hashlittle;

const OFFSET_BITS: u8 = 30;
const LOCATION_LEN: u8 = 5;
const SIZE_LEN: u8 = 4;
const SEGMENT_SIZE: u64 = 1 << OFFSET_BITS;

#[derive(Debug, Clone)]
struct WriterEntry {
    key: Vec<u8>,
    archive_id: u16,
    offset: u32,
    size: u32,
}

/// Builder for index files
#[derive(Debug, Clone)]
pub struct IndexWriter {
    layout: IndexLayout,
    key_len: usize,
    bucket: u8,
    version: u16,
    entries: Vec<WriterEntry>,
}

impl IndexWriter {
    /// Writer for `layout` with 9-byte keys
    pub fn new(layout: IndexLayout) -> Self {
        Self {
            layout,
            key_len: 9,
            bucket: 0,
            version: 7,
            entries: Vec::new(),
        }
    }

    /// Key width; the fixed legacy layout always writes 9 bytes
    #[must_use]
    pub const fn with_key_len(mut self, key_len: usize) -> Self {
        self.key_len = key_len;
        self
    }

    /// Bucket recorded in the variable-width header and file name
    #[must_use]
    pub const fn with_bucket(mut self, bucket: u8) -> Self {
        self.bucket = bucket;
        self
    }

    /// Variable-width header version (5 or 7)
    #[must_use]
    pub const fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Add an entry; the key is truncated or zero padded to the key width
    pub fn add_entry(&mut self, key: &[u8], archive_id: u16, offset: u32, size: u32) -> &mut Self {
        let width = self.entry_key_len();
        let mut key = key[..key.len().min(width)].to_vec();
        key.resize(width, 0);
        self.entries.push(WriterEntry {
            key,
            archive_id,
            offset,
            size,
        });
        self
    }

    /// Versioned file name, `{bucket:02x}{version:08x}.idx`
    pub fn file_name(&self, version: u32) -> String {
        format!("{:02x}{:08x}.idx", self.bucket, version)
    }

    /// Serialise the file
    pub fn build(&self) -> Vec<u8> {
        match self.layout {
            IndexLayout::VariableWidth => self.build_variable(),
            IndexLayout::GuardedFixed => self.build_guarded(),
            IndexLayout::FixedLegacy => self.build_legacy(),
        }
    }

    fn entry_key_len(&self) -> usize {
        match self.layout {
            IndexLayout::FixedLegacy => 9,
            _ => self.key_len,
        }
    }

    fn build_variable(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(VARIABLE_HEADER_BLOCK_SIZE as usize);
        block.extend_from_slice(&self.version.to_le_bytes());
        block.push(self.bucket);
        block.push(0);
        block.extend_from_slice(&[SIZE_LEN, LOCATION_LEN, self.key_len as u8, OFFSET_BITS]);
        block.extend_from_slice(&SEGMENT_SIZE.to_le_bytes());

        let mut out = Vec::new();
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&hashlittle(&block, 0).to_le_bytes());
        out.extend_from_slice(&block);
        out.resize(align16(out.len()), 0);

        let mut entries = Vec::new();
        for entry in &self.entries {
            let location = (u64::from(entry.archive_id) << OFFSET_BITS)
                | u64::from(entry.offset & GUARDED_OFFSET_MASK);
            entries.extend_from_slice(&entry.key);
            entries.extend_from_slice(&location.to_be_bytes()[8 - LOCATION_LEN as usize..]);
            entries.extend_from_slice(&entry.size.to_le_bytes());
        }

        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&hashlittle(&entries, 0).to_le_bytes());
        out.extend_from_slice(&entries);
        out
    }

    fn build_guarded(&self) -> Vec<u8> {
        let mut entries = Vec::new();
        for entry in &self.entries {
            let packed =
                (u32::from(entry.archive_id & 3) << 30) | (entry.offset & GUARDED_OFFSET_MASK);
            entries.extend_from_slice(&entry.key);
            entries.push((entry.archive_id >> 2) as u8);
            entries.extend_from_slice(&packed.to_be_bytes());
            entries.extend_from_slice(&entry.size.to_le_bytes());
        }

        let mut out = Vec::with_capacity(8 + entries.len());
        out.extend_from_slice(&(self.key_len as u32).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&entries);
        out
    }

    fn build_legacy(&self) -> Vec<u8> {
        const HASH_BLOCK: [u8; 8] = [0; 8];

        let mut out = Vec::new();
        out.extend_from_slice(&(HASH_BLOCK.len() as u32).to_le_bytes());
        out.extend_from_slice(&HASH_BLOCK);
        for entry in &self.entries {
            out.extend_from_slice(&entry.key);
            out.push(entry.archive_id as u8);
            out.extend_from_slice(&entry.offset.to_le_bytes());
            out.extend_from_slice(&entry.size.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_layout_offsets() {
        let mut writer = IndexWriter::new(IndexLayout::VariableWidth).with_bucket(0x0c);
        writer.add_entry(&[1; 9], 0, 0, 0);
        let data = writer.build();

        assert_eq!(&data[..4], &16u32.to_le_bytes());
        assert_eq!(data[0x0A], 0x0c);
        // Entries guard at align16(8 + 16)
        assert_eq!(&data[0x20..0x24], &18u32.to_le_bytes());
        assert_eq!(data.len(), 0x28 + 18);
        assert_eq!(writer.file_name(5), "0c00000005.idx");
    }

    #[test]
    fn test_short_keys_are_padded() {
        let mut writer = IndexWriter::new(IndexLayout::FixedLegacy).with_key_len(16);
        writer.add_entry(&[7; 4], 1, 2, 3);
        let data = writer.build();
        assert_eq!(data.len(), 12 + 18);
        assert_eq!(&data[12..21], &[7, 7, 7, 7, 0, 0, 0, 0, 0]);
    }
}
