//! BLTE payload builder
//!
//! Used by tests and fixtures to produce payloads in every framing the
//! decoder accepts.

use super::compression::compress_chunk;
use super::error::BlteResult;
use super::header::{BLTE_MAGIC, BlteHeader, ChunkInfo, HeaderFlags};
use super::CompressionMode;

/// Builder for creating BLTE payloads
#[derive(Debug, Clone, Default)]
pub struct BlteBuilder {
    chunks: Vec<(Vec<u8>, CompressionMode)>,
    single: bool,
    extended: bool,
}

impl BlteBuilder {
    /// Create a new BLTE builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use 40 byte descriptors carrying a decompressed-data MD5
    #[must_use]
    pub fn extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Produce a header-less payload holding exactly this chunk
    #[must_use]
    pub fn single(mut self, data: &[u8], mode: CompressionMode) -> Self {
        self.chunks = vec![(data.to_vec(), mode)];
        self.single = true;
        self
    }

    /// Append a chunk described in the chunk table
    #[must_use]
    pub fn add_chunk(mut self, data: &[u8], mode: CompressionMode) -> Self {
        self.chunks.push((data.to_vec(), mode));
        self.single = false;
        self
    }

    /// Split `data` into `chunk_size` pieces, each with `mode`
    #[must_use]
    pub fn add_data(mut self, data: &[u8], chunk_size: usize, mode: CompressionMode) -> Self {
        for piece in data.chunks(chunk_size.max(1)) {
            self = self.add_chunk(piece, mode);
        }
        self
    }

    /// Encode the payload
    pub fn build(self) -> BlteResult<Vec<u8>> {
        let mut encoded_chunks = Vec::with_capacity(self.chunks.len());
        let mut infos = Vec::with_capacity(self.chunks.len());

        for (data, mode) in &self.chunks {
            let mut raw = vec![mode.as_byte()];
            raw.extend(compress_chunk(data, *mode)?);

            infos.push(ChunkInfo {
                compressed_size: raw.len() as u32,
                decompressed_size: decoded_len(data, *mode),
                checksum: md5::compute(&raw).0,
                decompressed_checksum: self.extended.then(|| md5::compute(data).0),
            });
            encoded_chunks.push(raw);
        }

        let mut output = if self.single && encoded_chunks.len() == 1 {
            let mut preamble = BLTE_MAGIC.to_vec();
            preamble.extend_from_slice(&0u32.to_be_bytes());
            preamble
        } else {
            let flags = if self.extended {
                HeaderFlags::Extended
            } else {
                HeaderFlags::Standard
            };
            BlteHeader::with_table(flags, infos)?.to_bytes()?
        };

        for raw in encoded_chunks {
            output.extend_from_slice(&raw);
        }
        Ok(output)
    }
}

// Nested payloads declare the size of their own decoded output
fn decoded_len(data: &[u8], mode: CompressionMode) -> u32 {
    if mode == CompressionMode::Frame {
        super::decode(data).map_or(0, |decoded| decoded.len() as u32)
    } else {
        data.len() as u32
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::blte::{BlteFile, decode};

    #[test]
    fn test_single_framing() {
        let encoded = BlteBuilder::new()
            .single(b"Hello", CompressionMode::None)
            .build()
            .expect("build");
        assert_eq!(encoded, b"BLTE\0\0\0\0NHello");
    }

    #[test]
    fn test_one_chunk_with_table() {
        let encoded = BlteBuilder::new()
            .add_chunk(b"Hello", CompressionMode::ZLib)
            .build()
            .expect("build");
        let file = BlteFile::parse(&encoded).expect("parse");
        assert!(!file.header.is_single_chunk());
        assert_eq!(file.header.header_size, 36);
        assert_eq!(decode(&encoded).expect("decode"), b"Hello");
    }

    #[test]
    fn test_add_data_splits() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let encoded = BlteBuilder::new()
            .add_data(&data, 4096, CompressionMode::ZLib)
            .build()
            .expect("build");
        let file = BlteFile::parse(&encoded).expect("parse");
        assert_eq!(file.chunk_count(), 3);
        assert_eq!(decode(&encoded).expect("decode"), data);
    }

    #[test]
    fn test_extended_descriptor_checksum() {
        let encoded = BlteBuilder::new()
            .extended(true)
            .add_chunk(b"abc", CompressionMode::LZ4)
            .build()
            .expect("build");
        let file = BlteFile::parse(&encoded).expect("parse");
        let table = file.header.table.as_ref().expect("table");
        assert_eq!(table.flags, HeaderFlags::Extended);
        assert_eq!(
            table.chunk_infos[0].decompressed_checksum,
            Some(md5::compute(b"abc").0)
        );
    }
}
