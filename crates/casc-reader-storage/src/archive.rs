//! Data archive (`data.NNN`) access
//!
//! Archives are opened on first use and stay open until [`close`] is called.
//! Reads are bounds-checked against the archive size and return the stored
//! bytes untouched; BLTE decoding happens in the reader.
//!
//! [`close`]: ArchiveDataReader::close

use crate::index::IndexEntry;
use crate::{Result, StorageError};
use casc_reader_formats::blte::is_blte;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Size of the local header some archives put before each payload
///
/// Layout: reversed encoding key (16), `u32be` size including the header,
/// flags (2), two checksums (4 each).
pub const LOCAL_HEADER_SIZE: usize = 0x1E;

/// Reader over the numbered archives of one data directory
#[derive(Debug)]
pub struct ArchiveDataReader {
    data_dir: PathBuf,
    enable_mmap: bool,
    handles: Mutex<HashMap<u16, Arc<ArchiveHandle>>>,
}

#[derive(Debug)]
struct ArchiveHandle {
    size: u64,
    backing: Backing,
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    File(Mutex<File>),
}

impl ArchiveHandle {
    fn open(path: &Path, enable_mmap: bool) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        // Zero-length files cannot be mapped on every platform
        if enable_mmap && size > 0 {
            #[allow(unsafe_code)]
            let mapped = unsafe { MmapOptions::new().map(&file) };
            match mapped {
                Ok(mmap) => {
                    return Ok(Self {
                        size,
                        backing: Backing::Mapped(mmap),
                    });
                }
                Err(e) => debug!("Falling back to file reads for {}: {}", path.display(), e),
            }
        }

        Ok(Self {
            size,
            backing: Backing::File(Mutex::new(file)),
        })
    }

    fn read(&self, offset: u64, size: usize) -> std::io::Result<Vec<u8>> {
        match &self.backing {
            Backing::Mapped(mmap) => {
                let start = offset as usize;
                Ok(mmap[start..start + size].to_vec())
            }
            Backing::File(file) => {
                let mut file = file.lock();
                let mut buf = vec![0u8; size];
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl ArchiveDataReader {
    /// Reader over `data_dir`; nothing is opened yet
    pub fn new(data_dir: impl AsRef<Path>, enable_mmap: bool) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            enable_mmap,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Path of archive `archive_id`
    pub fn archive_path(&self, archive_id: u16) -> PathBuf {
        self.data_dir.join(format!("data.{archive_id:03}"))
    }

    fn handle(&self, archive_id: u16) -> Result<Arc<ArchiveHandle>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(&archive_id) {
            return Ok(Arc::clone(handle));
        }

        let path = self.archive_path(archive_id);
        let handle = ArchiveHandle::open(&path, self.enable_mmap).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(format!("archive {}", path.display()))
            } else {
                StorageError::Io(e)
            }
        })?;
        debug!(
            "Opened archive {} ({} bytes)",
            path.display(),
            handle.size
        );

        let handle = Arc::new(handle);
        handles.insert(archive_id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Size of an archive in bytes
    pub fn archive_size(&self, archive_id: u16) -> Result<u64> {
        Ok(self.handle(archive_id)?.size)
    }

    /// Read exactly `size` bytes at `offset`
    pub fn read(&self, archive_id: u16, offset: u64, size: u32) -> Result<Vec<u8>> {
        let handle = self.handle(archive_id)?;
        let end = offset.checked_add(u64::from(size));
        if end.is_none_or(|end| end > handle.size) {
            return Err(StorageError::OutOfBounds {
                archive_id,
                offset,
                size,
                archive_size: handle.size,
            });
        }
        trace!("Reading {} bytes at {:#x} from data.{:03}", size, offset, archive_id);
        Ok(handle.read(offset, size as usize)?)
    }

    /// Read the BLTE payload an index entry points at
    ///
    /// A local header in front of the payload is stripped. When the range is
    /// out of bounds or holds no BLTE payload, the byte-swapped offset is
    /// tried once; if that fails too the first outcome is returned.
    pub fn read_payload(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let first = self
            .read(entry.archive_id, u64::from(entry.offset), entry.size)
            .map(strip_local_header);
        let retry = match &first {
            Ok(data) => !is_blte(data),
            Err(StorageError::OutOfBounds { .. }) => true,
            Err(_) => false,
        };

        let swapped = entry.offset.swap_bytes();
        if retry && swapped != entry.offset {
            if let Ok(data) = self
                .read(entry.archive_id, u64::from(swapped), entry.size)
                .map(strip_local_header)
            {
                if is_blte(&data) {
                    debug!(
                        "Key {} found at byte-swapped offset {:#x} in data.{:03}",
                        entry.key, swapped, entry.archive_id
                    );
                    return Ok(data);
                }
            }
        }
        first
    }

    /// Number of archives currently open
    pub fn open_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Drop every open handle; later reads reopen lazily
    pub fn close(&self) {
        let mut handles = self.handles.lock();
        debug!("Closing {} archives", handles.len());
        handles.clear();
    }
}

/// Strip the local header when the BLTE magic sits right after it
pub fn strip_local_header(mut data: Vec<u8>) -> Vec<u8> {
    if !is_blte(&data) && data.len() > LOCAL_HEADER_SIZE && is_blte(&data[LOCAL_HEADER_SIZE..]) {
        data.drain(..LOCAL_HEADER_SIZE);
    }
    data
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::IndexKey;
    use pretty_assertions::assert_eq;

    fn archive_dir(contents: &[u8]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("data.002"), contents).expect("write");
        dir
    }

    fn entry(offset: u32, size: u32) -> IndexEntry {
        IndexEntry::new(IndexKey::from_slice(&[9; 9]).unwrap(), 2, offset, size)
    }

    #[test]
    fn test_reads_exact_ranges() {
        let contents: Vec<u8> = (0..=255u8).collect();
        let dir = archive_dir(&contents);

        for mmap in [true, false] {
            let reader = ArchiveDataReader::new(dir.path(), mmap);
            assert_eq!(reader.read(2, 16, 4).expect("read"), vec![16, 17, 18, 19]);
            assert_eq!(reader.read(2, 250, 6).expect("read").len(), 6);
            assert_eq!(reader.archive_size(2).expect("size"), 256);
            assert_eq!(reader.open_count(), 1);
        }
    }

    #[test]
    fn test_out_of_bounds_and_missing_archive() {
        let dir = archive_dir(&[0; 64]);
        let reader = ArchiveDataReader::new(dir.path(), true);

        assert!(matches!(
            reader.read(2, 60, 8),
            Err(StorageError::OutOfBounds {
                archive_id: 2,
                offset: 60,
                size: 8,
                archive_size: 64
            })
        ));
        assert!(matches!(
            reader.read(2, u64::MAX, 1),
            Err(StorageError::OutOfBounds { .. })
        ));
        assert!(reader.read(7, 0, 1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_close_releases_handles() {
        let dir = archive_dir(&[1; 8]);
        let reader = ArchiveDataReader::new(dir.path(), true);
        reader.read(2, 0, 8).expect("read");
        reader.close();
        assert_eq!(reader.open_count(), 0);
        assert_eq!(reader.read(2, 0, 2).expect("reopen"), vec![1, 1]);
    }

    #[test]
    fn test_payload_strips_local_header() {
        let mut contents = vec![0u8; 8];
        contents.extend_from_slice(&[0xEE; LOCAL_HEADER_SIZE]);
        contents.extend_from_slice(b"BLTE\0\0\0\0Nhi");
        let dir = archive_dir(&contents);
        let reader = ArchiveDataReader::new(dir.path(), true);

        let payload = reader
            .read_payload(&entry(8, (LOCAL_HEADER_SIZE + 11) as u32))
            .expect("payload");
        assert_eq!(payload, b"BLTE\0\0\0\0Nhi");
    }

    #[test]
    fn test_payload_falls_back_to_swapped_offset() {
        // 0x0100_0000 swaps to 0x0000_0001
        let mut contents = vec![0u8; 1];
        contents.extend_from_slice(b"BLTE\0\0\0\0Nok");
        let dir = archive_dir(&contents);
        let reader = ArchiveDataReader::new(dir.path(), false);

        let payload = reader.read_payload(&entry(0x0100_0000, 11)).expect("payload");
        assert_eq!(payload, b"BLTE\0\0\0\0Nok");

        let err = reader.read_payload(&entry(0x0200_0000, 11)).unwrap_err();
        assert!(matches!(err, StorageError::OutOfBounds { offset: 0x0200_0000, .. }));
    }
}
