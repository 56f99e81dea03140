//! TVFS header structures and parsing

use crate::tvfs::error::{TvfsError, TvfsResult};
use binrw::{BinRead, BinWrite};

/// Include content keys in container file table
pub const TVFS_FLAG_INCLUDE_CKEY: u32 = 0x01;
/// Encoding specification table present
pub const TVFS_FLAG_ENCODING_SPEC: u32 = 0x02;
/// Patch support enabled
pub const TVFS_FLAG_PATCH_SUPPORT: u32 = 0x04;

/// Header size without the encoding spec table fields
pub const TVFS_HEADER_SIZE: u8 = 38;
/// Header size with the encoding spec table fields
pub const TVFS_HEADER_SIZE_EST: u8 = 46;

/// TVFS file header, big-endian
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct TvfsHeader {
    /// Magic bytes: "TVFS"
    pub magic: [u8; 4],
    /// Format version (always 1)
    pub format_version: u8,
    /// Header size (38 without EST, 46 with EST)
    pub header_size: u8,
    /// Encoding key size
    pub ekey_size: u8,
    /// Patch key size
    pub pkey_size: u8,
    /// Format flags
    pub flags: u32,
    /// Path table offset
    pub path_table_offset: u32,
    /// Path table size
    pub path_table_size: u32,
    /// VFS table offset
    pub vfs_table_offset: u32,
    /// VFS table size
    pub vfs_table_size: u32,
    /// Container file table offset
    pub cft_table_offset: u32,
    /// Container file table size
    pub cft_table_size: u32,
    /// Maximum path depth
    pub max_depth: u16,
    /// Encoding spec table offset
    #[br(if(flags & TVFS_FLAG_ENCODING_SPEC != 0))]
    #[bw(if(*flags & TVFS_FLAG_ENCODING_SPEC != 0))]
    pub est_table_offset: Option<u32>,
    /// Encoding spec table size
    #[br(if(flags & TVFS_FLAG_ENCODING_SPEC != 0))]
    #[bw(if(*flags & TVFS_FLAG_ENCODING_SPEC != 0))]
    pub est_table_size: Option<u32>,
}

impl TvfsHeader {
    /// Create a header with empty tables and 9-byte keys
    pub fn new(flags: u32) -> Self {
        let est = flags & TVFS_FLAG_ENCODING_SPEC != 0;
        Self {
            magic: *b"TVFS",
            format_version: 1,
            header_size: if est {
                TVFS_HEADER_SIZE_EST
            } else {
                TVFS_HEADER_SIZE
            },
            ekey_size: 9,
            pkey_size: 9,
            flags,
            path_table_offset: 0,
            path_table_size: 0,
            vfs_table_offset: 0,
            vfs_table_size: 0,
            cft_table_offset: 0,
            cft_table_size: 0,
            max_depth: 0,
            est_table_offset: est.then_some(0),
            est_table_size: est.then_some(0),
        }
    }

    /// Validate header values
    pub fn validate(&self) -> TvfsResult<()> {
        if self.magic != *b"TVFS" {
            return Err(TvfsError::InvalidMagic(self.magic));
        }
        if self.format_version != 1 {
            return Err(TvfsError::UnsupportedVersion(self.format_version));
        }
        let expected = if self.has_encoding_spec() {
            TVFS_HEADER_SIZE_EST
        } else {
            TVFS_HEADER_SIZE
        };
        if self.header_size != expected {
            return Err(TvfsError::InvalidHeaderSize(self.header_size));
        }
        if !(1..=16).contains(&self.ekey_size) {
            return Err(TvfsError::InvalidKeySize(self.ekey_size));
        }
        Ok(())
    }

    /// Check if encoding spec table is present
    pub fn has_encoding_spec(&self) -> bool {
        self.flags & TVFS_FLAG_ENCODING_SPEC != 0
    }

    /// Width of CFT offsets in VFS spans
    pub fn cft_offs_size(&self) -> usize {
        offset_field_size(self.cft_table_size)
    }

    /// Width of EST offsets in CFT entries
    pub fn est_offs_size(&self) -> usize {
        offset_field_size(self.est_table_size.unwrap_or(0))
    }
}

/// Bytes needed to address any offset of a table of `table_size` bytes
pub fn offset_field_size(table_size: u32) -> usize {
    match table_size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Read a big-endian integer of 1..=4 bytes
pub(crate) fn read_be_uint(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

/// Write `value` as a big-endian integer of `width` bytes
pub(crate) fn write_be_uint(out: &mut Vec<u8>, value: u32, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[4 - width..]);
}
