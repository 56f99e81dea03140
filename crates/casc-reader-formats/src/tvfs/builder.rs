//! TVFS builder for synthetic VFS roots

use crate::tvfs::container_table::ContainerEntry;
use crate::tvfs::error::TvfsResult;
use crate::tvfs::header::{TVFS_FLAG_ENCODING_SPEC, TVFS_FLAG_INCLUDE_CKEY, TvfsHeader};
use crate::tvfs::path_table::build_level;
use crate::tvfs::vfs_table::{VfsSpan, write_vfs_entry};
use binrw::BinWrite;
use casc_reader_crypto::EncodingKey;
use std::io::Cursor;

/// Stored piece of a file: encoding key, encoded size, decoded size
pub type SpanSpec = (EncodingKey, u32, u32);

/// Builder for creating TVFS files
#[derive(Debug, Default)]
pub struct TvfsBuilder {
    files: Vec<(String, Vec<SpanSpec>)>,
    espec: Option<String>,
}

impl TvfsBuilder {
    /// Create a new TVFS builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an encoding spec table holding `espec` for every entry
    #[must_use]
    pub fn with_encoding_spec(mut self, espec: &str) -> Self {
        self.espec = Some(espec.to_string());
        self
    }

    /// Add a single-span file
    pub fn add_file(
        &mut self,
        path: &str,
        encoding_key: EncodingKey,
        encoded_size: u32,
        content_size: u32,
    ) -> &mut Self {
        self.add_file_spans(path, vec![(encoding_key, encoded_size, content_size)])
    }

    /// Add a file stored in several spans
    pub fn add_file_spans(&mut self, path: &str, spans: Vec<SpanSpec>) -> &mut Self {
        self.files.push((path.trim_start_matches('/').to_string(), spans));
        self
    }

    /// Build the TVFS file
    pub fn build(&self) -> TvfsResult<Vec<u8>> {
        let mut files: Vec<&(String, Vec<SpanSpec>)> = self.files.iter().collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut flags = TVFS_FLAG_INCLUDE_CKEY;
        let est_data = self.espec.as_ref().map(|espec| {
            flags |= TVFS_FLAG_ENCODING_SPEC;
            let mut data = espec.as_bytes().to_vec();
            data.push(0);
            data
        });
        let mut header = TvfsHeader::new(flags);
        if let Some(est) = &est_data {
            header.est_table_size = Some(est.len() as u32);
        }

        // Container entries first; VFS span widths depend on the CFT size
        let mut cft = Vec::new();
        let mut cft_offsets = Vec::with_capacity(files.len());
        for (_, spans) in &files {
            let offsets: Vec<u32> = spans
                .iter()
                .map(|&(encoding_key, encoded_size, content_size)| {
                    ContainerEntry {
                        encoding_key,
                        encoded_size,
                        est_offset: est_data.as_ref().map(|_| 0),
                        content_size,
                    }
                    .write(&mut cft, &header)
                })
                .collect();
            cft_offsets.push(offsets);
        }
        header.cft_table_size = cft.len() as u32;

        let mut vfs = Vec::new();
        let mut entries = Vec::with_capacity(files.len());
        for ((path, spans), offsets) in files.iter().zip(&cft_offsets) {
            let mut content_offset = 0u32;
            let vfs_spans: Vec<VfsSpan> = spans
                .iter()
                .zip(offsets)
                .map(|(&(_, _, content_size), &cft_offset)| {
                    let span = VfsSpan {
                        content_offset,
                        content_length: content_size,
                        cft_offset,
                    };
                    content_offset += content_size;
                    span
                })
                .collect();
            let offset = write_vfs_entry(&mut vfs, &vfs_spans, header.cft_offs_size());
            entries.push((path.as_str(), offset));
        }

        let mut path_table = Vec::new();
        build_level(&entries, false, &mut path_table)?;

        // Layout: header, path table, EST, CFT, VFS
        let path_offset = u32::from(header.header_size);
        header.path_table_offset = path_offset;
        header.path_table_size = path_table.len() as u32;
        let mut next = path_offset + header.path_table_size;
        if let Some(est) = &est_data {
            header.est_table_offset = Some(next);
            next += est.len() as u32;
        }
        header.cft_table_offset = next;
        header.vfs_table_offset = next + header.cft_table_size;
        header.vfs_table_size = vfs.len() as u32;
        header.max_depth = files
            .iter()
            .map(|(path, _)| path.split('/').count() as u16)
            .max()
            .unwrap_or(0);

        let mut output = Vec::new();
        header.write(&mut Cursor::new(&mut output))?;
        output.extend_from_slice(&path_table);
        if let Some(est) = &est_data {
            output.extend_from_slice(est);
        }
        output.extend_from_slice(&cft);
        output.extend_from_slice(&vfs);
        Ok(output)
    }
}
