//! Index file (.idx) management
//!
//! Index files map truncated storage keys to a location within the data
//! archives. Every `.idx` file in `Data/data/` is loaded into one table:
//!
//! - Versioned names (`{bucket:02x}{version:08x}.idx`) keep only the newest
//!   file of each bucket, provided every name in the directory follows the
//!   convention.
//! - Files merge in lexicographic name order and the first entry seen for a
//!   key wins.
//! - A file that fails to parse is reported and skipped; the rest still load.

mod layout;
mod writer;

pub use layout::{
    GUARDED_OFFSET_MASK, IndexLayout, LEGACY_ENTRY_SIZE, ParsedIndex, detect_layout, parse_index,
    unpack_guarded_location, unpack_variable_location,
};
pub use writer::IndexWriter;

use crate::observer::StorageObserver;
use crate::{Result, StorageError};
use futures::future::join_all;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Storage key as stored on disk, 1 to 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    bytes: [u8; 16],
    len: u8,
}

impl IndexKey {
    /// Longest supported key
    pub const MAX_LEN: usize = 16;

    /// Key from raw bytes; `None` when empty or longer than 16 bytes
    pub fn from_slice(key: &[u8]) -> Option<Self> {
        if key.is_empty() || key.len() > Self::MAX_LEN {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes[..key.len()].copy_from_slice(key);
        Some(Self {
            bytes,
            len: key.len() as u8,
        })
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Key width in bytes
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; keys hold at least one byte
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Location of one stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Truncated storage key
    pub key: IndexKey,
    /// Archive number (`data.NNN`)
    pub archive_id: u16,
    /// Offset within the archive
    pub offset: u32,
    /// Stored size, local header included
    pub size: u32,
}

impl IndexEntry {
    /// Create a new entry
    pub const fn new(key: IndexKey, archive_id: u16, offset: u32, size: u32) -> Self {
        Self {
            key,
            archive_id,
            offset,
            size,
        }
    }
}

/// Outcome of loading an index directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexLoadSummary {
    /// Files parsed and merged
    pub files_loaded: usize,
    /// Files rejected
    pub files_skipped: usize,
    /// Unique keys in the merged table
    pub entries: usize,
    /// Entries ignored because an earlier file already had the key
    pub duplicate_keys: usize,
}

/// Options for [`IndexStore::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexLoadOptions {
    /// Check variable-width header guards
    pub verify_checksums: bool,
    /// Parse files concurrently on blocking tasks
    pub parallel: bool,
}

impl Default for IndexLoadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            parallel: true,
        }
    }
}

/// Merged index table
#[derive(Debug, Clone, Default)]
pub struct IndexStore {
    entries: HashMap<IndexKey, IndexEntry>,
    // Widest first
    key_widths: Vec<usize>,
    summary: IndexLoadSummary,
}

impl IndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every index file in `dir`
    ///
    /// Fails when the directory cannot be read or no file in it yields a
    /// usable index; individual bad files are only reported to `observer`.
    pub async fn load(
        dir: &Path,
        options: IndexLoadOptions,
        observer: &dyn StorageObserver,
    ) -> Result<Self> {
        debug!("Loading index files from {}", dir.display());

        let mut dir_entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir_entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_ascii_lowercase().ends_with(".idx") {
                names.push(name);
            }
        }

        let paths: Vec<PathBuf> = select_index_files(names)
            .into_iter()
            .map(|name| dir.join(name))
            .collect();
        debug!("Selected {} index files", paths.len());

        let verify = options.verify_checksums;
        let results = if options.parallel {
            join_all(paths.iter().cloned().map(|path| load_file_blocking(path, verify))).await
        } else {
            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                results.push(load_file(path, verify).await);
            }
            results
        };

        let mut store = Self::new();
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(parsed) => {
                    trace!(
                        "{}: {} layout, {} entries",
                        path.display(),
                        parsed.layout,
                        parsed.entries.len()
                    );
                    store.add_index(parsed);
                }
                Err(e) => {
                    store.summary.files_skipped += 1;
                    observer.index_file_skipped(path, &e);
                }
            }
        }

        if store.summary.files_loaded == 0 {
            return Err(StorageError::NotFound(format!(
                "no usable index files in {}",
                dir.display()
            )));
        }

        observer.index_loaded(&store.summary);
        Ok(store)
    }

    /// Merge a parsed file; keys already present are kept
    pub fn add_index(&mut self, parsed: ParsedIndex) {
        self.summary.files_loaded += 1;
        if !self.key_widths.contains(&parsed.key_width) {
            self.key_widths.push(parsed.key_width);
            self.key_widths.sort_unstable_by(|a, b| b.cmp(a));
        }

        for entry in parsed.entries {
            match self.entries.entry(entry.key) {
                Entry::Occupied(_) => self.summary.duplicate_keys += 1,
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }
        self.summary.entries = self.entries.len();
    }

    /// Find the entry for a storage key
    ///
    /// Tries the key as given, then its leading and trailing N bytes for
    /// each on-disk key width N, widest first.
    pub fn find_entry(&self, hash: &[u8]) -> Option<&IndexEntry> {
        if let Some(entry) = IndexKey::from_slice(hash).and_then(|key| self.entries.get(&key)) {
            return Some(entry);
        }

        for &width in &self.key_widths {
            if hash.len() <= width {
                continue;
            }
            let leading = IndexKey::from_slice(&hash[..width]);
            let trailing = IndexKey::from_slice(&hash[hash.len() - width..]);
            for key in [leading, trailing].into_iter().flatten() {
                if let Some(entry) = self.entries.get(&key) {
                    trace!("Matched {} as {}", hex::encode(hash), key);
                    return Some(entry);
                }
            }
        }
        None
    }

    /// Number of unique keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// On-disk key widths seen, widest first
    pub fn key_widths(&self) -> &[usize] {
        &self.key_widths
    }

    /// Load statistics
    pub const fn summary(&self) -> &IndexLoadSummary {
        &self.summary
    }

    /// All entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

async fn load_file(path: &Path, verify: bool) -> Result<ParsedIndex> {
    let data = tokio::fs::read(path).await?;
    parse_index(&data, &file_label(path), verify)
}

async fn load_file_blocking(path: PathBuf, verify: bool) -> Result<ParsedIndex> {
    let data = tokio::fs::read(&path).await?;
    let label = file_label(&path);
    tokio::task::spawn_blocking(move || parse_index(&data, &label, verify))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
}

// `{bucket:02x}{version:08x}.idx`
fn versioned_bucket(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".idx")?;
    (stem.len() == 10 && stem.chars().all(|c| c.is_ascii_hexdigit())).then(|| stem[..2].to_string())
}

/// Pick the files to load, in load order
///
/// Versioned names keep only the lexicographically last file per bucket.
/// Names outside that convention are always kept.
pub fn select_index_files(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    let mut newest = BTreeMap::new();
    for name in &names {
        if let Some(bucket) = versioned_bucket(name) {
            newest.insert(bucket, name.clone());
        }
    }
    names.retain(|name| {
        versioned_bucket(name).is_none_or(|bucket| newest.get(&bucket) == Some(name))
    });
    names
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const KEY: [u8; 9] = [0xaa, 0xbb, 0xcc, 0xdd, 0x00, 0x11, 0x22, 0x33, 0xee];

    fn store_with(layout: IndexLayout) -> IndexStore {
        let mut writer = IndexWriter::new(layout);
        writer.add_entry(&KEY, 3, 4096, 1024);
        let parsed = parse_index(&writer.build(), "x.idx", true).expect("parse");
        let mut store = IndexStore::new();
        store.add_index(parsed);
        store
    }

    #[test]
    fn test_find_entry_by_full_and_truncated_hash() {
        let mut full = KEY.to_vec();
        full.extend_from_slice(&[0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0x10]);
        let mut sha1 = full.clone();
        sha1.extend_from_slice(&[1, 2, 3, 4]);

        for layout in [
            IndexLayout::VariableWidth,
            IndexLayout::GuardedFixed,
            IndexLayout::FixedLegacy,
        ] {
            let store = store_with(layout);
            for hash in [&KEY[..], &full[..], &sha1[..]] {
                let entry = store.find_entry(hash).expect("entry");
                assert_eq!((entry.size, entry.offset, entry.archive_id), (1024, 4096, 3));
            }
        }
    }

    #[test]
    fn test_find_entry_by_trailing_bytes() {
        let store = store_with(IndexLayout::GuardedFixed);
        let mut reversed = vec![0x77; 7];
        reversed.extend_from_slice(&KEY);
        assert!(store.find_entry(&reversed).is_some());
        assert!(store.find_entry(&[0x12; 16]).is_none());
        assert!(store.find_entry(&[]).is_none());
    }

    #[test]
    fn test_first_loaded_file_wins() {
        let mut store = IndexStore::new();
        for archive in [1u16, 2] {
            let mut writer = IndexWriter::new(IndexLayout::VariableWidth);
            writer.add_entry(&KEY, archive, 0, 10);
            store.add_index(parse_index(&writer.build(), "x.idx", false).expect("parse"));
        }
        assert_eq!(store.find_entry(&KEY).map(|e| e.archive_id), Some(1));
        assert_eq!(store.summary().duplicate_keys, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_select_newest_versioned_files() {
        let names = vec![
            "0100000002.idx".to_string(),
            "0000000001.idx".to_string(),
            "0100000001.idx".to_string(),
            "0000000003.idx".to_string(),
        ];
        assert_eq!(
            select_index_files(names),
            vec!["0000000003.idx".to_string(), "0100000002.idx".to_string()]
        );

        let mixed = vec![
            "extra.idx".to_string(),
            "0000000002.idx".to_string(),
            "0000000001.idx".to_string(),
            "a.idx".to_string(),
        ];
        assert_eq!(
            select_index_files(mixed),
            vec![
                "0000000002.idx".to_string(),
                "a.idx".to_string(),
                "extra.idx".to_string()
            ]
        );
    }

    #[derive(Default)]
    struct Recorder {
        skipped: Mutex<Vec<PathBuf>>,
        loaded: Mutex<Option<IndexLoadSummary>>,
    }

    impl StorageObserver for Recorder {
        fn index_loaded(&self, summary: &IndexLoadSummary) {
            *self.loaded.lock().unwrap() = Some(summary.clone());
        }

        fn index_file_skipped(&self, path: &Path, _error: &StorageError) {
            self.skipped.lock().unwrap().push(path.to_path_buf());
        }
    }

    #[tokio::test]
    async fn test_load_skips_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = IndexWriter::new(IndexLayout::VariableWidth);
        writer.add_entry(&KEY, 3, 4096, 1024);
        std::fs::write(dir.path().join("a.idx"), writer.build()).expect("write");
        std::fs::write(dir.path().join("b.idx"), b"not an index").expect("write");
        std::fs::write(dir.path().join("readme.txt"), b"ignored").expect("write");

        for parallel in [true, false] {
            let recorder = Recorder::default();
            let options = IndexLoadOptions {
                verify_checksums: true,
                parallel,
            };
            let store = IndexStore::load(dir.path(), options, &recorder)
                .await
                .expect("load");

            assert_eq!(store.len(), 1);
            assert_eq!(
                *recorder.skipped.lock().unwrap(),
                vec![dir.path().join("b.idx")]
            );
            let summary = recorder.loaded.lock().unwrap().clone().expect("summary");
            assert_eq!(summary.files_loaded, 1);
            assert_eq!(summary.files_skipped, 1);
        }
    }

    #[tokio::test]
    async fn test_load_prefers_newest_version_beside_odd_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, archive) in [("0000000001.idx", 1u16), ("0000000002.idx", 2)] {
            let mut writer = IndexWriter::new(IndexLayout::VariableWidth);
            writer.add_entry(&KEY, archive, 0, 10);
            std::fs::write(dir.path().join(name), writer.build()).expect("write");
        }
        let mut writer = IndexWriter::new(IndexLayout::VariableWidth);
        writer.add_entry(&[0x01; 9], 7, 0, 10);
        std::fs::write(dir.path().join("extra.idx"), writer.build()).expect("write");

        let store = IndexStore::load(dir.path(), IndexLoadOptions::default(), &NoopObserver)
            .await
            .expect("load");

        assert_eq!(store.find_entry(&KEY).map(|e| e.archive_id), Some(2));
        assert_eq!(store.find_entry(&[0x01; 9]).map(|e| e.archive_id), Some(7));
        assert_eq!(store.summary().files_loaded, 2);
        assert_eq!(store.summary().duplicate_keys, 0);
    }

    #[tokio::test]
    async fn test_load_fails_without_usable_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = IndexStore::load(dir.path(), IndexLoadOptions::default(), &NoopObserver).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        let missing = dir.path().join("missing");
        let result = IndexStore::load(&missing, IndexLoadOptions::default(), &NoopObserver).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
