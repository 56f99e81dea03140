//! The three physical index layouts
//!
//! A layout is chosen by inspecting the header, never by file name:
//!
//! | Layout | Header | Entry |
//! |--------|--------|-------|
//! | Variable-width | guarded block, version 5 or 7, field widths | key, BE location, LE size |
//! | Guarded fixed | `hash_size`, `entries_size` | key, `u8` high, BE packed, LE size |
//! | Fixed legacy | hash block size + hash block | 9-byte key, `u8` archive, LE offset, LE size |
//!
//! Each layout has its own unpacking function since the bit splits differ.

use super::{IndexEntry, IndexKey};
use crate::{Result, StorageError};
use binrw::BinRead;
use casc_reader_crypto::hashlittle;
use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;

/// Physical layout of an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexLayout {
    /// Versioned header declaring field widths
    VariableWidth,
    /// Hash size and entries size header, 30-bit offsets
    GuardedFixed,
    /// Hash block followed by 18-byte entries
    FixedLegacy,
}

impl fmt::Display for IndexLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VariableWidth => write!(f, "variable-width"),
            Self::GuardedFixed => write!(f, "guarded fixed"),
            Self::FixedLegacy => write!(f, "fixed legacy"),
        }
    }
}

/// Entries of one index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndex {
    /// Detected layout
    pub layout: IndexLayout,
    /// On-disk key width
    pub key_width: usize,
    /// Entries in file order
    pub entries: Vec<IndexEntry>,
}

/// Smallest guarded header block of the variable-width layout
pub const VARIABLE_HEADER_BLOCK_SIZE: u32 = 0x10;
/// Entry size of the fixed legacy layout
pub const LEGACY_ENTRY_SIZE: usize = 18;
/// Offset mask of the guarded fixed layout
pub const GUARDED_OFFSET_MASK: u32 = 0x3FFF_FFFF;

/// Variable-width header, inside its guarded block
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct VariableHeader {
    header_block_size: u32,
    header_block_hash: u32,
    version: u16,
    _bucket: u8,
    _extra: u8,
    size_len: u8,
    location_len: u8,
    key_len: u8,
    offset_bits: u8,
    _segment_size: u64,
}

impl VariableHeader {
    fn is_candidate(&self) -> bool {
        matches!(self.version, 5 | 7) && self.header_block_size >= VARIABLE_HEADER_BLOCK_SIZE
    }

    // Start of the entries guard (size + hash)
    fn entries_table_offset(&self) -> usize {
        align16(8 + self.header_block_size as usize)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(1..=16).contains(&self.key_len) {
            return Err(format!("key width {} outside 1..=16", self.key_len));
        }
        if !(1..=8).contains(&self.location_len) || !(1..=8).contains(&self.size_len) {
            return Err(format!(
                "location width {} or size width {} outside 1..=8",
                self.location_len, self.size_len
            ));
        }
        let location_bits = u32::from(self.location_len) * 8;
        let offset_bits = u32::from(self.offset_bits);
        if offset_bits == 0 || offset_bits > 32 || offset_bits > location_bits {
            return Err(format!(
                "offset bits {} invalid for a {}-byte location",
                self.offset_bits, self.location_len
            ));
        }
        if location_bits - offset_bits > 16 {
            return Err(format!(
                "{} archive bits do not fit an archive number",
                location_bits - offset_bits
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct GuardedHeader {
    hash_size: u32,
    entries_size: u32,
}

impl GuardedHeader {
    fn entry_width(&self) -> usize {
        self.hash_size as usize + 9
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct LegacyEntry {
    key: [u8; 9],
    archive: u8,
    offset: u32,
    size: u32,
}

pub(crate) const fn align16(value: usize) -> usize {
    (value + 15) & !15
}

fn variable_header(data: &[u8]) -> Option<VariableHeader> {
    let header = VariableHeader::read(&mut Cursor::new(data)).ok()?;
    let guarded_end = 8 + header.header_block_size as usize;
    (header.is_candidate() && guarded_end <= data.len()).then_some(header)
}

fn guarded_header(data: &[u8]) -> Option<GuardedHeader> {
    let header = GuardedHeader::read(&mut Cursor::new(data)).ok()?;
    let entries_size = header.entries_size as usize;
    let plausible = (9..=16).contains(&header.hash_size)
        && entries_size > 0
        && entries_size % header.entry_width() == 0
        && 8 + entries_size <= data.len();
    plausible.then_some(header)
}

fn legacy_hash_block(data: &[u8]) -> Option<usize> {
    let size = u32::from_le_bytes(data.get(..4)?.try_into().ok()?) as usize;
    let remaining = data.len().checked_sub(4 + size)?;
    (size % 4 == 0 && remaining % LEGACY_ENTRY_SIZE == 0).then_some(size)
}

/// Detect the layout: variable-width, then guarded fixed, then fixed legacy
pub fn detect_layout(data: &[u8]) -> Option<IndexLayout> {
    if variable_header(data).is_some() {
        Some(IndexLayout::VariableWidth)
    } else if guarded_header(data).is_some() {
        Some(IndexLayout::GuardedFixed)
    } else if legacy_hash_block(data).is_some() {
        Some(IndexLayout::FixedLegacy)
    } else {
        None
    }
}

/// Parse an index file of any layout
///
/// `source_name` only labels errors. `verify_checksums` checks the header
/// guard of the variable-width layout.
pub fn parse_index(data: &[u8], source_name: &str, verify_checksums: bool) -> Result<ParsedIndex> {
    match detect_layout(data) {
        Some(IndexLayout::VariableWidth) => parse_variable(data, source_name, verify_checksums),
        Some(IndexLayout::GuardedFixed) => parse_guarded(data, source_name),
        Some(IndexLayout::FixedLegacy) => parse_legacy(data, source_name),
        None => Err(StorageError::malformed(
            source_name,
            "header matches no known index layout",
        )),
    }
}

/// Split a variable-width location into archive and offset
pub fn unpack_variable_location(location: u64, offset_bits: u8) -> (u16, u32) {
    let archive = location >> offset_bits;
    let offset = location & ((1u64 << offset_bits) - 1);
    (archive as u16, offset as u32)
}

/// Split a guarded fixed location into archive and offset
pub fn unpack_guarded_location(archive_high: u8, packed: u32) -> (u16, u32) {
    let archive = (u16::from(archive_high) << 2) | (packed >> 30) as u16;
    (archive, packed & GUARDED_OFFSET_MASK)
}

fn read_be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

fn read_le_uint(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

fn is_padding(key: &[u8]) -> bool {
    key.iter().all(|&b| b == 0)
}

fn parse_variable(data: &[u8], source_name: &str, verify: bool) -> Result<ParsedIndex> {
    let header = variable_header(data)
        .ok_or_else(|| StorageError::malformed(source_name, "truncated variable-width header"))?;
    header
        .validate()
        .map_err(|reason| StorageError::malformed(source_name, reason))?;

    if verify {
        let block = &data[8..8 + header.header_block_size as usize];
        let actual = hashlittle(block, 0);
        if actual != header.header_block_hash {
            return Err(StorageError::malformed(
                source_name,
                format!(
                    "header hash {actual:08x} does not match {:08x}",
                    header.header_block_hash
                ),
            ));
        }
    }

    let table = header.entries_table_offset();
    let entries_size = data
        .get(table..table + 4)
        .map(read_le_uint)
        .ok_or_else(|| StorageError::malformed(source_name, "missing entries guard"))?
        as usize;
    let start = table + 8;
    let end = start + entries_size.min(data.len().saturating_sub(start));

    let key_len = usize::from(header.key_len);
    let location_len = usize::from(header.location_len);
    let width = key_len + location_len + usize::from(header.size_len);

    let mut entries = Vec::with_capacity((end - start) / width);
    for raw in data.get(start..end).unwrap_or_default().chunks_exact(width) {
        let (key, rest) = raw.split_at(key_len);
        let (location, size) = rest.split_at(location_len);
        if is_padding(key) {
            continue;
        }
        let Ok(size) = u32::try_from(read_le_uint(size)) else {
            continue;
        };
        let (archive_id, offset) =
            unpack_variable_location(read_be_uint(location), header.offset_bits);
        if let Some(key) = IndexKey::from_slice(key) {
            entries.push(IndexEntry::new(key, archive_id, offset, size));
        }
    }

    Ok(ParsedIndex {
        layout: IndexLayout::VariableWidth,
        key_width: key_len,
        entries,
    })
}

fn parse_guarded(data: &[u8], source_name: &str) -> Result<ParsedIndex> {
    let header = guarded_header(data)
        .ok_or_else(|| StorageError::malformed(source_name, "truncated guarded header"))?;
    let key_len = header.hash_size as usize;
    let body = &data[8..8 + header.entries_size as usize];

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(body.len() / header.entry_width());
    for raw in body.chunks_exact(header.entry_width()) {
        let (key, rest) = raw.split_at(key_len);
        if is_padding(key) || !seen.insert(key) {
            continue;
        }
        let packed = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]);
        let size = u32::from_le_bytes([rest[5], rest[6], rest[7], rest[8]]);
        let (archive_id, offset) = unpack_guarded_location(rest[0], packed);
        if let Some(key) = IndexKey::from_slice(key) {
            entries.push(IndexEntry::new(key, archive_id, offset, size));
        }
    }

    Ok(ParsedIndex {
        layout: IndexLayout::GuardedFixed,
        key_width: key_len,
        entries,
    })
}

fn parse_legacy(data: &[u8], source_name: &str) -> Result<ParsedIndex> {
    let hash_block = legacy_hash_block(data)
        .ok_or_else(|| StorageError::malformed(source_name, "implausible legacy hash block"))?;

    let mut entries = Vec::new();
    for raw in data[4 + hash_block..].chunks_exact(LEGACY_ENTRY_SIZE) {
        let entry = LegacyEntry::read(&mut Cursor::new(raw))
            .map_err(|e| StorageError::malformed(source_name, e.to_string()))?;
        if is_padding(&entry.key) {
            continue;
        }
        if let Some(key) = IndexKey::from_slice(&entry.key) {
            entries.push(IndexEntry::new(
                key,
                u16::from(entry.archive),
                entry.offset,
                entry.size,
            ));
        }
    }

    Ok(ParsedIndex {
        layout: IndexLayout::FixedLegacy,
        key_width: 9,
        entries,
    })
}
