use crate::encoding::error::EncodingError;
use binrw::{BinRead, BinWrite};

/// Encoding table magic
pub const ENCODING_MAGIC: [u8; 2] = *b"EN";

/// Size of the fixed header
pub const HEADER_SIZE: usize = 22;

/// Size of one page index record (first key + page MD5)
pub const PAGE_INDEX_ENTRY_SIZE: usize = 32;

/// Encoding table header (22 bytes, big-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct EncodingHeader {
    /// Magic bytes: 'EN'
    pub magic: [u8; 2],

    /// Version (always 1)
    pub version: u8,

    /// Size of content key hashes
    pub ckey_hash_size: u8,

    /// Size of encoding key hashes
    pub ekey_hash_size: u8,

    /// Content key page size in KiB
    pub ckey_page_size_kb: u16,

    /// Encoding key page size in KiB
    pub ekey_page_size_kb: u16,

    /// Number of content key pages
    pub ckey_page_count: u32,

    /// Number of encoding key pages
    pub ekey_page_count: u32,

    /// Flags byte, must be 0
    pub flags: u8,

    /// Size of the `ESpec` string block following the header
    pub espec_block_size: u32,
}

impl EncodingHeader {
    /// Header with 16 byte keys, 4 KiB pages and no pages yet
    pub fn new() -> Self {
        Self {
            magic: ENCODING_MAGIC,
            version: 1,
            ckey_hash_size: 16,
            ekey_hash_size: 16,
            ckey_page_size_kb: 4,
            ekey_page_size_kb: 4,
            ckey_page_count: 0,
            ekey_page_count: 0,
            flags: 0,
            espec_block_size: 0,
        }
    }

    /// Reject headers no producer writes
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.magic != ENCODING_MAGIC {
            return Err(EncodingError::InvalidMagic(self.magic));
        }

        if self.version != 1 {
            return Err(EncodingError::UnsupportedVersion(self.version));
        }

        if self.flags != 0 {
            return Err(EncodingError::InvalidFlags(self.flags));
        }

        for (field, value) in [
            ("ckey_hash_size", self.ckey_hash_size),
            ("ekey_hash_size", self.ekey_hash_size),
        ] {
            if value == 0 || value > 16 {
                return Err(EncodingError::InvalidHashSize { field, value });
            }
        }

        if self.ckey_page_size_kb == 0 || self.ekey_page_size_kb == 0 {
            return Err(EncodingError::InvalidPageSize(0));
        }

        for (field, value) in [
            ("ckey_page_count", self.ckey_page_count),
            ("ekey_page_count", self.ekey_page_count),
        ] {
            if value == 0 {
                return Err(EncodingError::InvalidPageCount { field, value });
            }
        }

        if self.espec_block_size == 0 {
            return Err(EncodingError::InvalidESpecBlockSize(self.espec_block_size));
        }

        Ok(())
    }

    /// Content key page size in bytes
    pub fn ckey_page_size(&self) -> usize {
        self.ckey_page_size_kb as usize * 1024
    }

    /// Encoding key page size in bytes
    pub fn ekey_page_size(&self) -> usize {
        self.ekey_page_size_kb as usize * 1024
    }

    /// Bytes the header says the table occupies, excluding any trailing `ESpec`
    pub fn data_size(&self) -> usize {
        HEADER_SIZE
            + self.espec_block_size as usize
            + self.ckey_page_count as usize * (PAGE_INDEX_ENTRY_SIZE + self.ckey_page_size())
            + self.ekey_page_count as usize * (PAGE_INDEX_ENTRY_SIZE + self.ekey_page_size())
    }
}

impl Default for EncodingHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn valid_header() -> EncodingHeader {
        EncodingHeader {
            ckey_page_count: 1,
            ekey_page_count: 1,
            espec_block_size: 10,
            ..EncodingHeader::new()
        }
    }

    #[test]
    fn test_header_is_22_big_endian_bytes() {
        let mut header = valid_header();
        header.ckey_page_count = 0x0102_0304;
        let mut buffer = Vec::new();
        header
            .write(&mut Cursor::new(&mut buffer))
            .expect("write header");
        assert_eq!(buffer.len(), HEADER_SIZE);
        assert_eq!(&buffer[0..2], b"EN");
        assert_eq!(&buffer[9..13], &[1, 2, 3, 4]);

        let parsed = EncodingHeader::read(&mut Cursor::new(&buffer)).expect("read header");
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_valid_header_passes_validation() {
        assert!(valid_header().validate().is_ok());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let mut h = valid_header();
        h.magic = *b"NE";
        assert!(matches!(h.validate(), Err(EncodingError::InvalidMagic(_))));

        let mut h = valid_header();
        h.version = 2;
        assert!(matches!(
            h.validate(),
            Err(EncodingError::UnsupportedVersion(2))
        ));

        let mut h = valid_header();
        h.flags = 1;
        assert!(matches!(h.validate(), Err(EncodingError::InvalidFlags(1))));

        let mut h = valid_header();
        h.ekey_hash_size = 17;
        assert!(matches!(
            h.validate(),
            Err(EncodingError::InvalidHashSize {
                field: "ekey_hash_size",
                value: 17
            })
        ));

        let mut h = valid_header();
        h.ckey_page_count = 0;
        assert!(matches!(
            h.validate(),
            Err(EncodingError::InvalidPageCount {
                field: "ckey_page_count",
                ..
            })
        ));

        let mut h = valid_header();
        h.espec_block_size = 0;
        assert!(matches!(
            h.validate(),
            Err(EncodingError::InvalidESpecBlockSize(0))
        ));
    }
}
