//! BLTE chunk compression and decompression

use super::chunk::{ChunkData, CompressionMode};
use super::error::{BlteError, BlteResult};
use super::{DecodeOptions, decode_at_depth};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Maximum allowed decompression size (1 GB)
///
/// Shared by every chunk of a payload, nested payloads included.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Largest pre-allocation taken from a descriptor's declared size
pub const MAX_SIZE_HINT: usize = 64 * 1024 * 1024;

/// Output still allowed for one payload, claimed as chunks decode
#[derive(Debug)]
pub(crate) struct OutputBudget {
    remaining: AtomicUsize,
}

impl OutputBudget {
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }

    pub(crate) fn reserve(&self, bytes: usize) -> BlteResult<()> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(bytes)
            })
            .map(|_| ())
            .map_err(|_| size_exceeded())
    }
}

pub(crate) fn size_exceeded() -> BlteError {
    BlteError::DecompressionFailed(format!(
        "decompressed size exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
    ))
}

/// Compress data using specified mode
///
/// `Frame` expects `data` to already be a complete BLTE payload.
pub fn compress_chunk(data: &[u8], mode: CompressionMode) -> BlteResult<Vec<u8>> {
    match mode {
        CompressionMode::None | CompressionMode::Frame => Ok(data.to_vec()),
        CompressionMode::ZLib => {
            let mut encoder = ZlibEncoder::new(data, Compression::default());
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed).map_err(|e| {
                BlteError::CompressionError(format!("ZLib compression failed: {e}"))
            })?;
            Ok(compressed)
        }
        CompressionMode::LZ4 => {
            // 8-byte LE decompressed size prefix + single LZ4 block
            let max_compressed_size = lz4_flex::block::get_maximum_output_size(data.len());
            let mut result = vec![0u8; 8 + max_compressed_size];
            result[0..8].copy_from_slice(&(data.len() as u64).to_le_bytes());

            let compressed_len = lz4_flex::block::compress_into(data, &mut result[8..])
                .map_err(|e| BlteError::CompressionError(format!("LZ4 compression failed: {e}")))?;

            result.truncate(8 + compressed_len);
            Ok(result)
        }
        CompressionMode::Encrypted => Err(BlteError::UnsupportedCompressionMode(mode.as_byte())),
    }
}

/// Decompress one chunk
///
/// `depth` is the nesting level of the payload that owns the chunk.
pub fn decompress_chunk(
    chunk: &ChunkData<'_>,
    options: &DecodeOptions,
    depth: usize,
) -> BlteResult<Vec<u8>> {
    decompress_chunk_within(chunk, options, depth, &OutputBudget::new(MAX_DECOMPRESSION_SIZE))
}

pub(crate) fn decompress_chunk_within(
    chunk: &ChunkData<'_>,
    options: &DecodeOptions,
    depth: usize,
    budget: &OutputBudget,
) -> BlteResult<Vec<u8>> {
    let data = chunk.payload();
    match chunk.mode {
        CompressionMode::None => {
            budget.reserve(data.len())?;
            Ok(data.to_vec())
        }
        CompressionMode::ZLib => inflate(data, chunk.size_hint(), budget),
        CompressionMode::LZ4 => decompress_lz4(data, budget),
        CompressionMode::Frame => {
            if depth + 1 > options.max_depth {
                return Err(BlteError::RecursionLimit(options.max_depth));
            }
            decode_at_depth(data, options, depth + 1, budget)
        }
        CompressionMode::Encrypted => Err(BlteError::UnsupportedCompressionMode(
            chunk.mode.as_byte(),
        )),
    }
}

fn inflate(data: &[u8], size_hint: usize, budget: &OutputBudget) -> BlteResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(size_hint.min(MAX_SIZE_HINT));

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.read(&mut buffer).map_err(|e| {
            BlteError::DecompressionFailed(format!("ZLib decompression failed: {e}"))
        })?;

        if bytes_read == 0 {
            break;
        }

        budget.reserve(bytes_read)?;
        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    // The stream must account for the whole descriptor-declared chunk
    let consumed = decoder.total_in();
    if consumed != data.len() as u64 {
        return Err(BlteError::DecompressionFailed(format!(
            "ZLib stream consumed {consumed} of {} bytes",
            data.len()
        )));
    }

    Ok(decompressed)
}

fn decompress_lz4(data: &[u8], budget: &OutputBudget) -> BlteResult<Vec<u8>> {
    if data.len() < 8 {
        return Err(BlteError::DecompressionFailed(
            "LZ4 data too short - missing size header".to_string(),
        ));
    }

    let (size_header, compressed) = data.split_at(8);
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(size_header);
    let declared = u64::from_le_bytes(size_bytes);

    let decompressed_size = usize::try_from(declared)
        .ok()
        .filter(|&size| size <= MAX_DECOMPRESSION_SIZE)
        .ok_or_else(|| {
            BlteError::DecompressionFailed(format!(
                "LZ4 decompressed size {declared} exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
            ))
        })?;
    budget.reserve(decompressed_size)?;

    let decompressed = lz4_flex::block::decompress(compressed, decompressed_size)
        .map_err(|e| BlteError::DecompressionFailed(format!("LZ4 decompression failed: {e}")))?;

    if decompressed.len() != decompressed_size {
        return Err(BlteError::DecompressionFailed(format!(
            "LZ4 decompression size mismatch: expected {decompressed_size}, got {}",
            decompressed.len()
        )));
    }

    Ok(decompressed)
}
