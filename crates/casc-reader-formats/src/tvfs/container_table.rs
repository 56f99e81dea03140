//! TVFS container file table: fixed-stride entries addressed by byte offset

use crate::tvfs::error::{TvfsError, TvfsResult};
use crate::tvfs::header::{TvfsHeader, read_be_uint, write_be_uint};
use casc_reader_crypto::EncodingKey;

/// Container entry: where a span's bytes are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Encoding key, truncated to the header's key size
    pub encoding_key: EncodingKey,
    /// Stored (encoded) size
    pub encoded_size: u32,
    /// Offset of the `ESpec` string in the EST, when the table exists
    pub est_offset: Option<u32>,
    /// Decoded size
    pub content_size: u32,
}

impl ContainerEntry {
    /// Encoded width of an entry for `header`
    pub fn encoded_len(header: &TvfsHeader) -> usize {
        let est = if header.has_encoding_spec() {
            header.est_offs_size()
        } else {
            0
        };
        usize::from(header.ekey_size) + 4 + est + 4
    }

    /// Parse the entry at `offset`
    pub fn parse_at(data: &[u8], offset: usize, header: &TvfsHeader) -> TvfsResult<Self> {
        let raw = data
            .get(offset..offset + Self::encoded_len(header))
            .ok_or(TvfsError::CftTableTruncated(offset))?;
        let key_len = usize::from(header.ekey_size);
        let encoding_key =
            EncodingKey::from_prefix(&raw[..key_len]).ok_or(TvfsError::CftTableTruncated(offset))?;
        let mut pos = key_len;
        let encoded_size = read_be_uint(&raw[pos..pos + 4]);
        pos += 4;
        let est_offset = if header.has_encoding_spec() {
            let width = header.est_offs_size();
            let value = read_be_uint(&raw[pos..pos + width]);
            pos += width;
            Some(value)
        } else {
            None
        };
        let content_size = read_be_uint(&raw[pos..pos + 4]);

        Ok(Self {
            encoding_key,
            encoded_size,
            est_offset,
            content_size,
        })
    }

    /// Append the entry, returning its offset
    pub(crate) fn write(&self, out: &mut Vec<u8>, header: &TvfsHeader) -> u32 {
        let offset = out.len() as u32;
        out.extend_from_slice(&self.encoding_key.as_bytes()[..usize::from(header.ekey_size)]);
        out.extend_from_slice(&self.encoded_size.to_be_bytes());
        if header.has_encoding_spec() {
            write_be_uint(out, self.est_offset.unwrap_or(0), header.est_offs_size());
        }
        out.extend_from_slice(&self.content_size.to_be_bytes());
        offset
    }
}
