//! TVFS VFS table: span lists addressed by byte offset

use crate::tvfs::error::{TvfsError, TvfsResult};
use crate::tvfs::header::{read_be_uint, write_be_uint};

/// Largest span count of a file entry; larger values mark other entry kinds
pub const MAX_SPAN_COUNT: u8 = 224;

/// One contiguous piece of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VfsSpan {
    /// Offset of the span within the file
    pub content_offset: u32,
    /// Length of the span
    pub content_length: u32,
    /// Offset of the container entry within the CFT
    pub cft_offset: u32,
}

impl VfsSpan {
    /// Encoded width of a span
    pub const fn encoded_len(cft_offs_size: usize) -> usize {
        8 + cft_offs_size
    }
}

/// Parse the span list at `offset`
pub fn parse_vfs_entry(
    data: &[u8],
    offset: usize,
    cft_offs_size: usize,
) -> TvfsResult<Vec<VfsSpan>> {
    let count = *data
        .get(offset)
        .ok_or(TvfsError::VfsTableTruncated(offset))?;
    if count == 0 || count > MAX_SPAN_COUNT {
        return Err(TvfsError::InvalidSpanCount { count, offset });
    }

    let span_len = VfsSpan::encoded_len(cft_offs_size);
    let start = offset + 1;
    let end = start + usize::from(count) * span_len;
    let raw = data
        .get(start..end)
        .ok_or(TvfsError::VfsTableTruncated(offset))?;

    Ok(raw
        .chunks_exact(span_len)
        .map(|span| VfsSpan {
            content_offset: read_be_uint(&span[..4]),
            content_length: read_be_uint(&span[4..8]),
            cft_offset: read_be_uint(&span[8..]),
        })
        .collect())
}

/// Append a span list, returning its offset
pub(crate) fn write_vfs_entry(out: &mut Vec<u8>, spans: &[VfsSpan], cft_offs_size: usize) -> u32 {
    let offset = out.len() as u32;
    out.push(spans.len() as u8);
    for span in spans {
        out.extend_from_slice(&span.content_offset.to_be_bytes());
        out.extend_from_slice(&span.content_length.to_be_bytes());
        write_be_uint(out, span.cft_offset, cft_offs_size);
    }
    offset
}
