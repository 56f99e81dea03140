//! Complete block manifest

use crate::root::block::RootBlock;
use crate::root::error::{RootError, RootResult};
use crate::root::version::{RootHeader, RootVersion};
use crate::root::RootRecord;
use casc_reader_crypto::{ContentKey, FileDataId, Jenkins96};
use std::io::Cursor;

/// Parsed block manifest (`V1`..`V4`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    /// Detected layout
    pub version: RootVersion,
    /// Header, absent for `V1`
    pub header: Option<RootHeader>,
    /// Non-empty blocks in file order
    pub blocks: Vec<RootBlock>,
}

impl RootFile {
    /// Parse a decoded manifest
    ///
    /// Parsing stops quietly at a damaged block once at least one block has
    /// been read; a manifest whose first block is damaged is an error.
    pub fn parse(data: &[u8]) -> RootResult<Self> {
        let version = RootVersion::detect(data);
        let header = if version.has_header() {
            Some(RootHeader::parse(data)?)
        } else {
            None
        };

        let mut cursor = Cursor::new(data);
        cursor.set_position(header.map_or(0, |h| u64::from(h.header_size)));

        let mut blocks = Vec::new();
        while cursor.position() < data.len() as u64 {
            match RootBlock::parse(&mut cursor, version) {
                Ok(block) if block.records.is_empty() => {}
                Ok(block) => blocks.push(block),
                Err(e) if blocks.is_empty() => return Err(e),
                Err(_) => break,
            }
        }

        Ok(Self {
            version,
            header,
            blocks,
        })
    }

    /// Every record paired with its block
    pub fn records(&self) -> impl Iterator<Item = (&RootBlock, &RootRecord)> {
        self.blocks
            .iter()
            .flat_map(|block| block.records.iter().map(move |record| (block, record)))
    }

    /// Records of blocks whose locale intersects `mask`
    pub fn records_for_locale(&self, mask: u32) -> impl Iterator<Item = (&RootBlock, &RootRecord)> {
        self.records()
            .filter(move |(block, _)| block.locale_flags.intersects(mask))
    }

    /// Number of records across all blocks
    pub fn total_records(&self) -> usize {
        self.blocks.iter().map(|b| b.records.len()).sum()
    }

    /// First content key recorded for `id`
    pub fn find_by_id(&self, id: FileDataId) -> Option<ContentKey> {
        self.records()
            .find(|(_, r)| r.file_data_id == id)
            .map(|(_, r)| r.content_key)
    }

    /// First content key recorded for the hashed form of `path`
    pub fn find_by_path(&self, path: &str) -> Option<ContentKey> {
        let hash = Jenkins96::hash_path(path).hash64;
        self.records()
            .find(|(_, r)| r.name_hash == Some(hash))
            .map(|(_, r)| r.content_key)
    }
}

impl crate::CascFormat<'_> for RootFile {
    type Error = RootError;

    fn parse(data: &[u8]) -> RootResult<Self> {
        RootFile::parse(data)
    }
}
