//! BLTE chunk views and compression modes

use super::error::{BlteError, BlteResult};
use super::header::ChunkInfo;

/// BLTE compression modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMode {
    /// No compression (mode 'N')
    None = b'N',
    /// `ZLib` compression (mode 'Z')
    ZLib = b'Z',
    /// LZ4 compression (mode '4')
    LZ4 = b'4',
    /// Encrypted (mode 'E')
    Encrypted = b'E',
    /// Nested BLTE payload (mode 'F')
    Frame = b'F',
}

impl CompressionMode {
    /// Parse compression mode from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'N' => Some(Self::None),
            b'Z' => Some(Self::ZLib),
            b'4' => Some(Self::LZ4),
            b'E' => Some(Self::Encrypted),
            b'F' => Some(Self::Frame),
            _ => None,
        }
    }

    /// Get the byte representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One chunk of a parsed payload, borrowed from the input buffer
#[derive(Debug, Clone, Copy)]
pub struct ChunkData<'a> {
    /// Compression mode
    pub mode: CompressionMode,
    /// Mode byte followed by the chunk payload
    raw: &'a [u8],
    /// Descriptor, absent for single implicit chunks
    pub info: Option<&'a ChunkInfo>,
}

impl<'a> ChunkData<'a> {
    /// Split a chunk into mode and payload
    pub fn new(raw: &'a [u8], info: Option<&'a ChunkInfo>) -> BlteResult<Self> {
        let &mode_byte = raw.first().ok_or(BlteError::EmptyChunk)?;
        let mode = CompressionMode::from_byte(mode_byte)
            .ok_or(BlteError::UnknownCompressionMode(mode_byte))?;
        Ok(Self { mode, raw, info })
    }

    /// Chunk payload without the mode byte
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[1..]
    }

    /// Mode byte plus payload, the region the descriptor checksum covers
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Compressed size including the mode byte
    pub fn compressed_size(&self) -> usize {
        self.raw.len()
    }

    /// Declared decompressed size, used only as an allocation hint
    pub fn size_hint(&self) -> usize {
        self.info.map_or(0, |i| i.decompressed_size as usize)
    }

    /// Verify the descriptor checksum; all-zero checksums are not checked
    pub fn verify_checksum(&self, index: usize) -> BlteResult<()> {
        let Some(info) = self.info else {
            return Ok(());
        };
        if info.checksum == [0u8; 16] {
            return Ok(());
        }

        let actual = md5::compute(self.raw).0;
        if actual == info.checksum {
            Ok(())
        } else {
            Err(BlteError::ChecksumMismatch {
                chunk: index,
                expected: hex::encode(info.checksum),
                actual: hex::encode(actual),
            })
        }
    }
}
