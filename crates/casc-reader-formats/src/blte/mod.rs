//! BLTE (Block Table Encoded) container decoding
//!
//! Every payload stored in a local archive is BLTE framed: a `BLTE` magic, a
//! big-endian header size and, when that size is non-zero, a table of chunk
//! descriptors. Each chunk starts with a one byte mode tag.
//!
//! | Mode | Meaning |
//! |------|---------|
//! | `N`  | stored |
//! | `Z`  | zlib |
//! | `4`  | LZ4 block with an 8 byte little-endian size prefix |
//! | `F`  | another BLTE payload, decoded recursively up to a depth limit |
//! | `E`  | encrypted, rejected with [`BlteError::UnsupportedCompressionMode`] |
//!
//! ```
//! use casc_reader_formats::blte::{self, BlteBuilder, CompressionMode};
//!
//! let encoded = BlteBuilder::new()
//!     .add_chunk(b"hello ", CompressionMode::None)
//!     .add_chunk(b"world", CompressionMode::ZLib)
//!     .build()
//!     .unwrap();
//! assert_eq!(blte::decode(&encoded).unwrap(), b"hello world");
//! ```

mod builder;
mod chunk;
mod compression;
mod error;
mod header;

pub use builder::BlteBuilder;
pub use chunk::{ChunkData, CompressionMode};
pub use compression::{MAX_DECOMPRESSION_SIZE, compress_chunk, decompress_chunk};

use compression::{OutputBudget, decompress_chunk_within, size_exceeded};
pub use error::{BlteError, BlteResult};
pub use header::{BLTE_MAGIC, BlteHeader, ChunkInfo, ChunkTable, HeaderFlags};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default limit for nested `F` chunks
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Knobs for decoding a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum nesting of `F` chunks; 0 rejects any nested payload
    pub max_depth: usize,
    /// Verify descriptor MD5s before decompressing each chunk
    pub verify_checksums: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            verify_checksums: false,
        }
    }
}

/// A parsed payload whose chunks borrow from the input
#[derive(Debug, Clone)]
pub struct BlteFile<'a> {
    /// BLTE header
    pub header: BlteHeader,
    chunk_ranges: Vec<(usize, usize)>,
    data: &'a [u8],
}

impl<'a> BlteFile<'a> {
    /// Parse the framing of a payload
    ///
    /// Chunk regions are laid out back to back from the header size offset
    /// and must cover the rest of the input exactly.
    pub fn parse(data: &'a [u8]) -> BlteResult<Self> {
        let header = BlteHeader::parse(data)?;
        let start = header.data_offset();

        let chunk_ranges = match &header.table {
            None => {
                if data.len() <= start {
                    return Err(BlteError::EmptyChunk);
                }
                vec![(start, data.len())]
            }
            Some(table) => {
                let mut ranges = Vec::with_capacity(table.chunk_infos.len());
                let mut offset = start;
                for info in &table.chunk_infos {
                    if info.compressed_size == 0 {
                        return Err(BlteError::EmptyChunk);
                    }
                    let end = offset + info.compressed_size as usize;
                    if end > data.len() {
                        return Err(BlteError::Truncated {
                            needed: end,
                            available: data.len(),
                        });
                    }
                    ranges.push((offset, end));
                    offset = end;
                }
                if offset != data.len() {
                    return Err(BlteError::TrailingData {
                        expected: offset,
                        actual: data.len(),
                    });
                }
                ranges
            }
        };

        Ok(Self {
            header,
            chunk_ranges,
            data,
        })
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunk_ranges.len()
    }

    /// Borrow chunk `index`
    pub fn chunk(&self, index: usize) -> BlteResult<ChunkData<'_>> {
        let &(start, end) = self
            .chunk_ranges
            .get(index)
            .ok_or(BlteError::InvalidChunkCount(index as u32))?;
        let info = self
            .header
            .table
            .as_ref()
            .and_then(|t| t.chunk_infos.get(index));
        ChunkData::new(&self.data[start..end], info)
    }

    /// Sum of declared decompressed sizes
    fn declared_size(&self) -> u64 {
        self.header.table.as_ref().map_or(0, |table| {
            table
                .chunk_infos
                .iter()
                .map(|info| u64::from(info.decompressed_size))
                .sum()
        })
    }

    /// Decode every chunk and concatenate in descriptor order
    pub fn decompress(&self, options: &DecodeOptions) -> BlteResult<Vec<u8>> {
        self.decompress_at_depth(options, 0, &OutputBudget::new(MAX_DECOMPRESSION_SIZE))
    }

    fn decode_chunk(
        &self,
        index: usize,
        options: &DecodeOptions,
        depth: usize,
        budget: &OutputBudget,
    ) -> BlteResult<Vec<u8>> {
        let chunk = self.chunk(index)?;
        if options.verify_checksums {
            chunk.verify_checksum(index)?;
        }
        decompress_chunk_within(&chunk, options, depth, budget)
    }

    fn decompress_at_depth(
        &self,
        options: &DecodeOptions,
        depth: usize,
        budget: &OutputBudget,
    ) -> BlteResult<Vec<u8>> {
        let declared = self.declared_size();
        if declared > MAX_DECOMPRESSION_SIZE as u64 {
            return Err(size_exceeded());
        }

        #[cfg(feature = "parallel")]
        let parts: Vec<Vec<u8>> = if self.chunk_count() > 1 {
            (0..self.chunk_count())
                .into_par_iter()
                .map(|index| self.decode_chunk(index, options, depth, budget))
                .collect::<BlteResult<Vec<_>>>()?
        } else {
            vec![self.decode_chunk(0, options, depth, budget)?]
        };

        #[cfg(not(feature = "parallel"))]
        let parts: Vec<Vec<u8>> = (0..self.chunk_count())
            .map(|index| self.decode_chunk(index, options, depth, budget))
            .collect::<BlteResult<Vec<_>>>()?;

        let total: usize = parts.iter().map(Vec::len).sum();
        let hint = usize::try_from(declared)
            .unwrap_or(usize::MAX)
            .min(compression::MAX_SIZE_HINT);
        let mut result = Vec::with_capacity(total.max(hint));
        for part in parts {
            result.extend_from_slice(&part);
        }
        Ok(result)
    }
}

impl<'a> crate::CascFormat<'a> for BlteFile<'a> {
    type Error = BlteError;

    fn parse(data: &'a [u8]) -> BlteResult<Self> {
        Self::parse(data)
    }
}

/// Decode a payload with default options
pub fn decode(data: &[u8]) -> BlteResult<Vec<u8>> {
    decode_with_options(data, &DecodeOptions::default())
}

/// Decode a payload
pub fn decode_with_options(data: &[u8], options: &DecodeOptions) -> BlteResult<Vec<u8>> {
    decode_at_depth(data, options, 0, &OutputBudget::new(MAX_DECOMPRESSION_SIZE))
}

/// Check for the BLTE magic without parsing further
pub fn is_blte(data: &[u8]) -> bool {
    data.starts_with(&BLTE_MAGIC)
}

pub(crate) fn decode_at_depth(
    data: &[u8],
    options: &DecodeOptions,
    depth: usize,
    budget: &OutputBudget,
) -> BlteResult<Vec<u8>> {
    BlteFile::parse(data)?.decompress_at_depth(options, depth, budget)
}
