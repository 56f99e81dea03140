//! Root blocks: records sharing one set of content and locale flags
//!
//! Every layout stores the `FileDataId`s of a block as deltas: the first is
//! the id itself and each following delta counts the ids skipped since the
//! previous record.

use crate::root::error::{RootError, RootResult};
use crate::root::flags::{ContentFlags, LocaleFlags};
use crate::root::version::RootVersion;
use binrw::{BinRead, BinWrite};
use casc_reader_crypto::{ContentKey, FileDataId};
use std::io::Cursor;

/// Blocks declaring more records than this are treated as garbage
pub const MAX_BLOCK_RECORDS: u32 = 1_000_000;

/// One file of a root block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    /// Numeric file identifier
    pub file_data_id: FileDataId,
    /// Content key of the file
    pub content_key: ContentKey,
    /// Jenkins96 hash of the normalised path, when the block carries names
    pub name_hash: Option<u64>,
}

/// Block of records with shared flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootBlock {
    /// Content flags of every record
    pub content_flags: ContentFlags,
    /// Locale flags of every record
    pub locale_flags: LocaleFlags,
    /// Records in on-disk order
    pub records: Vec<RootRecord>,
}

struct BlockHeader {
    num_records: u32,
    content_flags: ContentFlags,
    locale_flags: LocaleFlags,
}

fn read_header(cursor: &mut Cursor<&[u8]>, version: RootVersion) -> binrw::BinResult<BlockHeader> {
    let num_records = u32::read_le(cursor)?;
    let (content_flags, locale_flags) = match version {
        RootVersion::V1 | RootVersion::V2 => {
            let content = u32::read_le(cursor)?;
            let locale = u32::read_le(cursor)?;
            (u64::from(content), locale)
        }
        RootVersion::V3 => {
            let locale = u32::read_le(cursor)?;
            let content1 = u32::read_le(cursor)?;
            let content2 = u32::read_le(cursor)?;
            let content3 = u8::read_le(cursor)?;
            (
                u64::from(content1 | content2) | (u64::from(content3) << 17),
                locale,
            )
        }
        RootVersion::V4 => {
            let locale = u32::read_le(cursor)?;
            let low = u32::read_le(cursor)?;
            let high = u8::read_le(cursor)?;
            let _unk2 = u32::read_le(cursor)?;
            let _unk3 = u8::read_le(cursor)?;
            (u64::from(low) | (u64::from(high) << 32), locale)
        }
    };
    Ok(BlockHeader {
        num_records,
        content_flags: ContentFlags::new(content_flags),
        locale_flags: LocaleFlags::new(locale_flags),
    })
}

/// Decode delta-coded ids: `current += delta; id = current; current += 1`
pub(crate) fn decode_file_data_ids(deltas: &[u32]) -> Vec<FileDataId> {
    let mut current: u32 = 0;
    deltas
        .iter()
        .map(|&delta| {
            current = current.wrapping_add(delta);
            let id = current;
            current = current.wrapping_add(1);
            FileDataId::new(id)
        })
        .collect()
}

pub(crate) fn encode_file_data_ids(ids: impl IntoIterator<Item = FileDataId>) -> Vec<u32> {
    let mut expected: u32 = 0;
    ids.into_iter()
        .map(|id| {
            let delta = id.get().wrapping_sub(expected);
            expected = id.get().wrapping_add(1);
            delta
        })
        .collect()
}

impl RootBlock {
    /// Whether records of this block carry name hashes in `version`
    pub const fn has_name_hashes(&self, version: RootVersion) -> bool {
        matches!(version, RootVersion::V1) || self.content_flags.has_name_hashes()
    }

    /// Parse one block at the cursor
    ///
    /// A block declaring zero records yields an empty block; the caller
    /// skips it.
    pub fn parse(cursor: &mut Cursor<&[u8]>, version: RootVersion) -> RootResult<Self> {
        let offset = cursor.position();
        let data_len = cursor.get_ref().len() as u64;
        if data_len - offset < version.block_header_size() as u64 {
            return Err(RootError::TruncatedBlock(offset));
        }
        let header = read_header(cursor, version)?;
        if header.num_records > MAX_BLOCK_RECORDS {
            return Err(RootError::CorruptedBlockHeader {
                offset,
                records: header.num_records,
            });
        }

        let mut block = Self {
            content_flags: header.content_flags,
            locale_flags: header.locale_flags,
            records: Vec::new(),
        };
        let count = header.num_records as usize;
        let has_names = block.has_name_hashes(version);
        let record_size = 4 + 16 + if has_names { 8 } else { 0 };
        if data_len - cursor.position() < (count * record_size) as u64 {
            return Err(RootError::TruncatedBlock(offset));
        }

        let mut deltas = Vec::with_capacity(count);
        for _ in 0..count {
            deltas.push(u32::read_le(cursor)?);
        }
        let ids = decode_file_data_ids(&deltas);

        block.records = if matches!(version, RootVersion::V1) {
            // Interleaved key and name hash
            let mut records = Vec::with_capacity(count);
            for file_data_id in ids {
                let content_key = ContentKey::read_le(cursor)?;
                let name_hash = u64::read_le(cursor)?;
                records.push(RootRecord {
                    file_data_id,
                    content_key,
                    name_hash: Some(name_hash),
                });
            }
            records
        } else {
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(ContentKey::read_le(cursor)?);
            }
            let mut hashes = Vec::with_capacity(count);
            if has_names {
                for _ in 0..count {
                    hashes.push(Some(u64::read_le(cursor)?));
                }
            } else {
                hashes.resize(count, None);
            }
            ids.into_iter()
                .zip(keys)
                .zip(hashes)
                .map(|((file_data_id, content_key), name_hash)| RootRecord {
                    file_data_id,
                    content_key,
                    name_hash,
                })
                .collect()
        };

        Ok(block)
    }

    /// Serialise the block in `version` layout
    pub fn write(&self, out: &mut Vec<u8>, version: RootVersion) -> RootResult<()> {
        let mut cursor = Cursor::new(out);
        cursor.set_position(cursor.get_ref().len() as u64);
        let writer = &mut cursor;

        let flags = self.content_flags.value();
        let low_flags = (flags & 0xFFFF_FFFF) as u32;
        (self.records.len() as u32).write_le(writer)?;
        match version {
            RootVersion::V1 | RootVersion::V2 => {
                low_flags.write_le(writer)?;
                self.locale_flags.value().write_le(writer)?;
            }
            RootVersion::V3 => {
                self.locale_flags.value().write_le(writer)?;
                low_flags.write_le(writer)?;
                0u32.write_le(writer)?;
                0u8.write_le(writer)?;
            }
            RootVersion::V4 => {
                self.locale_flags.value().write_le(writer)?;
                low_flags.write_le(writer)?;
                (((flags >> 32) & 0xFF) as u8).write_le(writer)?;
                0u32.write_le(writer)?;
                0u8.write_le(writer)?;
            }
        }

        for delta in encode_file_data_ids(self.records.iter().map(|r| r.file_data_id)) {
            delta.write_le(writer)?;
        }

        if matches!(version, RootVersion::V1) {
            for record in &self.records {
                record.content_key.write_le(writer)?;
                record.name_hash.unwrap_or(0).write_le(writer)?;
            }
        } else {
            for record in &self.records {
                record.content_key.write_le(writer)?;
            }
            if self.has_name_hashes(version) {
                for record in &self.records {
                    record.name_hash.unwrap_or(0).write_le(writer)?;
                }
            }
        }
        Ok(())
    }
}
