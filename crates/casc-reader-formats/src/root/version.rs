//! Root manifest version detection and headers

use crate::root::error::{RootError, RootResult};
use std::fmt;

/// Block manifest layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootVersion {
    /// No header; 12-byte block headers, interleaved key/hash records
    V1,
    /// Classic `MFST`/`TSFM` header; 12-byte block headers, separated arrays
    V2,
    /// Extended header (version 2 or 3); 17-byte block headers
    V3,
    /// Extended header (version 4+); 18-byte block headers, 40-bit content flags
    V4,
}

impl RootVersion {
    /// Detect the layout from the first bytes of a manifest
    ///
    /// MFST headers are big-endian and TSFM headers little-endian. An
    /// extended header is recognised by a small header size followed by an
    /// even smaller version number; a classic header starts with the file
    /// count instead.
    pub fn detect(data: &[u8]) -> Self {
        let Some(magic) = data.get(..4).and_then(|m| RootMagic::from_bytes([m[0], m[1], m[2], m[3]]))
        else {
            return Self::V1;
        };
        let (Some(value1), Some(value2)) = (magic.read_u32(data, 4), magic.read_u32(data, 8)) else {
            return Self::V2;
        };

        if looks_extended(value1, value2) {
            match value2 {
                0..=3 => Self::V3,
                _ => Self::V4,
            }
        } else {
            Self::V2
        }
    }

    /// Whether the manifest starts with a header
    pub const fn has_header(self) -> bool {
        !matches!(self, Self::V1)
    }

    /// Block header width in bytes
    pub const fn block_header_size(self) -> usize {
        match self {
            Self::V1 | Self::V2 => 12,
            Self::V3 => 17,
            Self::V4 => 18,
        }
    }
}

impl fmt::Display for RootVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        };
        write!(f, "V{n}")
    }
}

fn looks_extended(value1: u32, value2: u32) -> bool {
    (16..100).contains(&value1) && value2 < 10 && value2 < value1
}

/// Header magic; selects header byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootMagic {
    /// `MFST`, big-endian header fields
    Mfst,
    /// `TSFM`, little-endian header fields
    Tsfm,
}

impl RootMagic {
    /// Parse from bytes
    pub const fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        match &bytes {
            b"MFST" => Some(Self::Mfst),
            b"TSFM" => Some(Self::Tsfm),
            _ => None,
        }
    }

    /// Magic as written on disk
    pub const fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::Mfst => *b"MFST",
            Self::Tsfm => *b"TSFM",
        }
    }

    fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            Self::Mfst => u32::from_be_bytes(bytes),
            Self::Tsfm => u32::from_le_bytes(bytes),
        })
    }

    pub(crate) fn write_u32(self, out: &mut Vec<u8>, value: u32) {
        match self {
            Self::Mfst => out.extend_from_slice(&value.to_be_bytes()),
            Self::Tsfm => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Manifest header (absent for V1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHeader {
    /// Header magic
    pub magic: RootMagic,
    /// Declared header size; blocks start here
    pub header_size: u32,
    /// Version field of extended headers (0 for classic headers)
    pub version: u32,
    /// Total file count
    pub total_files: u32,
    /// Named file count
    pub named_files: u32,
}

/// Classic header: magic, total, named
pub const CLASSIC_HEADER_SIZE: u32 = 12;
/// Extended header: magic, size, version, total, named, padding
pub const EXTENDED_HEADER_SIZE: u32 = 24;

impl RootHeader {
    /// Read the header of a `V2`..`V4` manifest
    pub fn parse(data: &[u8]) -> RootResult<Self> {
        let truncated = || RootError::TruncatedBlock(0);
        let magic = data
            .get(..4)
            .and_then(|m| RootMagic::from_bytes([m[0], m[1], m[2], m[3]]))
            .ok_or_else(truncated)?;
        let value1 = magic.read_u32(data, 4).ok_or_else(truncated)?;
        let value2 = magic.read_u32(data, 8).ok_or_else(truncated)?;

        if !looks_extended(value1, value2) {
            return Ok(Self {
                magic,
                header_size: CLASSIC_HEADER_SIZE,
                version: 0,
                total_files: value1,
                named_files: value2,
            });
        }

        // Size, version, total and named must all fit before the blocks
        if value1 < 20 || value1 as usize > data.len() {
            return Err(RootError::InvalidHeaderSize(value1));
        }
        Ok(Self {
            magic,
            header_size: value1,
            version: value2,
            total_files: magic.read_u32(data, 12).ok_or_else(truncated)?,
            named_files: magic.read_u32(data, 16).ok_or_else(truncated)?,
        })
    }

    /// Serialise the header
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic.to_bytes());
        if self.version == 0 {
            self.magic.write_u32(out, self.total_files);
            self.magic.write_u32(out, self.named_files);
            return;
        }
        let start = out.len() - 4;
        self.magic.write_u32(out, self.header_size);
        self.magic.write_u32(out, self.version);
        self.magic.write_u32(out, self.total_files);
        self.magic.write_u32(out, self.named_files);
        out.resize(start + self.header_size as usize, 0);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header(magic: RootMagic, version: u32) -> Vec<u8> {
        let mut out = Vec::new();
        RootHeader {
            magic,
            header_size: if version == 0 {
                CLASSIC_HEADER_SIZE
            } else {
                EXTENDED_HEADER_SIZE
            },
            version,
            total_files: 5000,
            named_files: 4000,
        }
        .write(&mut out);
        out
    }

    #[test]
    fn test_detect_without_magic_is_v1() {
        assert_eq!(RootVersion::detect(&[1, 0, 0, 0, 0, 0, 0, 0]), RootVersion::V1);
        assert_eq!(RootVersion::detect(&[]), RootVersion::V1);
    }

    #[test]
    fn test_detect_header_variants() {
        for magic in [RootMagic::Mfst, RootMagic::Tsfm] {
            assert_eq!(RootVersion::detect(&header(magic, 0)), RootVersion::V2);
            assert_eq!(RootVersion::detect(&header(magic, 2)), RootVersion::V3);
            assert_eq!(RootVersion::detect(&header(magic, 3)), RootVersion::V3);
            assert_eq!(RootVersion::detect(&header(magic, 4)), RootVersion::V4);
        }
    }

    #[test]
    fn test_header_byte_order() {
        let mfst = header(RootMagic::Mfst, 0);
        assert_eq!(&mfst[4..8], &5000u32.to_be_bytes());
        let tsfm = header(RootMagic::Tsfm, 0);
        assert_eq!(&tsfm[4..8], &5000u32.to_le_bytes());

        let parsed = RootHeader::parse(&tsfm).expect("parse");
        assert_eq!(parsed.total_files, 5000);
        assert_eq!(parsed.named_files, 4000);
    }

    #[test]
    fn test_extended_header_size() {
        let data = header(RootMagic::Mfst, 4);
        assert_eq!(data.len(), EXTENDED_HEADER_SIZE as usize);
        let parsed = RootHeader::parse(&data).expect("parse");
        assert_eq!(parsed.header_size, 24);
        assert_eq!(parsed.version, 4);
        assert_eq!(parsed.total_files, 5000);
    }

    #[test]
    fn test_extended_header_past_end() {
        let mut data = header(RootMagic::Mfst, 3);
        data[4..8].copy_from_slice(&64u32.to_be_bytes());
        assert!(matches!(
            RootHeader::parse(&data),
            Err(RootError::InvalidHeaderSize(64))
        ));
    }
}
