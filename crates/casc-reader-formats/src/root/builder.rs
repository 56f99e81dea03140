//! Builder for block manifests

use crate::root::block::{RootBlock, RootRecord};
use crate::root::error::RootResult;
use crate::root::flags::{ContentFlags, LocaleFlags};
use crate::root::version::{
    CLASSIC_HEADER_SIZE, EXTENDED_HEADER_SIZE, RootHeader, RootMagic, RootVersion,
};
use casc_reader_crypto::{ContentKey, FileDataId, Jenkins96};

/// Builder producing manifests in any block layout
#[derive(Debug, Clone)]
pub struct RootBuilder {
    version: RootVersion,
    magic: RootMagic,
    blocks: Vec<RootBlock>,
}

impl RootBuilder {
    /// Create a builder for `version` with an `MFST` header
    pub fn new(version: RootVersion) -> Self {
        Self {
            version,
            magic: RootMagic::Mfst,
            blocks: Vec::new(),
        }
    }

    /// Header magic, and with it the header byte order
    #[must_use]
    pub fn with_magic(mut self, magic: RootMagic) -> Self {
        self.magic = magic;
        self
    }

    /// Add a file; files sharing flags land in the same block
    pub fn add_file(
        &mut self,
        file_data_id: FileDataId,
        content_key: ContentKey,
        path: Option<&str>,
        locale_flags: LocaleFlags,
        content_flags: ContentFlags,
    ) -> &mut Self {
        let record = RootRecord {
            file_data_id,
            content_key,
            name_hash: path.map(|p| Jenkins96::hash_path(p).hash64),
        };
        if let Some(block) = self
            .blocks
            .iter_mut()
            .find(|b| b.locale_flags == locale_flags && b.content_flags == content_flags)
        {
            block.records.push(record);
        } else {
            self.blocks.push(RootBlock {
                content_flags,
                locale_flags,
                records: vec![record],
            });
        }
        self
    }

    /// Serialise the manifest
    pub fn build(&self) -> RootResult<Vec<u8>> {
        let mut out = Vec::new();
        let blocks: Vec<RootBlock> = self.blocks.iter().map(|b| self.prepare(b)).collect();

        if self.version.has_header() {
            let total_files = blocks.iter().map(|b| b.records.len()).sum::<usize>() as u32;
            let named_files = blocks
                .iter()
                .flat_map(|b| &b.records)
                .filter(|r| r.name_hash.is_some())
                .count() as u32;
            let (header_size, version) = match self.version {
                RootVersion::V3 => (EXTENDED_HEADER_SIZE, 3),
                RootVersion::V4 => (EXTENDED_HEADER_SIZE, 4),
                RootVersion::V1 | RootVersion::V2 => (CLASSIC_HEADER_SIZE, 0),
            };
            RootHeader {
                magic: self.magic,
                header_size,
                version,
                total_files,
                named_files,
            }
            .write(&mut out);
        }

        for block in &blocks {
            block.write(&mut out, self.version)?;
        }
        Ok(out)
    }

    // Sorted ids; blocks with any unnamed record drop their name hashes
    fn prepare(&self, block: &RootBlock) -> RootBlock {
        let mut block = block.clone();
        block.records.sort_by_key(|r| r.file_data_id);
        let unnamed = block.records.iter().any(|r| r.name_hash.is_none());
        if unnamed && self.version != RootVersion::V1 {
            block.content_flags =
                ContentFlags::new(block.content_flags.value() | ContentFlags::NO_NAME_HASH);
            for record in &mut block.records {
                record.name_hash = None;
            }
        }
        block
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::root::RootFile;

    #[test]
    fn test_unnamed_records_set_flag() {
        let mut builder = RootBuilder::new(RootVersion::V2);
        builder
            .add_file(
                FileDataId::new(7),
                ContentKey::from_bytes([7; 16]),
                None,
                LocaleFlags::default(),
                ContentFlags::default(),
            )
            .add_file(
                FileDataId::new(3),
                ContentKey::from_bytes([3; 16]),
                Some("a.txt"),
                LocaleFlags::default(),
                ContentFlags::default(),
            );
        let root = RootFile::parse(&builder.build().expect("build")).expect("parse");

        let block = &root.blocks[0];
        assert!(!block.content_flags.has_name_hashes());
        assert_eq!(block.records[0].file_data_id, FileDataId::new(3));
        assert_eq!(root.header.map(|h| h.named_files), Some(0));
    }
}
