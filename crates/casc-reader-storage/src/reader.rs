//! Storage reader facade
//!
//! [`StorageReader::open`] loads the layers in dependency order:
//!
//! ```text
//! Uninitialized -> IndexLoaded -> (EncodingLoaded) -> (RootsLoaded) -> Ready
//! ```
//!
//! Index files and the build manifest load concurrently. Only the index is
//! required: without an encoding table or roots the reader still reaches
//! `Ready`, resolving storage keys directly and treating a 32 hex digit
//! file name as a key.

use crate::archive::ArchiveDataReader;
use crate::build_manifest::{self, BuildManifest};
use crate::config::StorageConfig;
use crate::encoding_table::EncodingTable;
use crate::index::{IndexEntry, IndexLoadOptions, IndexStore};
use crate::observer::{StorageObserver, TracingObserver};
use crate::root_table::{RootTable, RootTarget, parse_root_blob};
use crate::{Result, StorageError};
use casc_reader_crypto::{ContentKey, EncodingKey, FileDataId};
use casc_reader_formats::blte::{self, DecodeOptions};
use casc_reader_formats::listfile::Listfile;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Initialisation progress of a [`StorageReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StorageState {
    /// Nothing loaded
    Uninitialized,
    /// Index files loaded
    IndexLoaded,
    /// Encoding table loaded
    EncodingLoaded,
    /// At least one root merged
    RootsLoaded,
    /// Open for requests
    Ready,
}

/// What a caller asks the reader for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileLocator {
    /// Logical file path
    Path(String),
    /// Numeric file id
    FileDataId(FileDataId),
    /// Content key
    ContentKey(ContentKey),
    /// Storage key, possibly truncated
    EncodingKey(EncodingKey),
}

impl FileLocator {
    /// A decimal number is a `FileDataId`; anything else is a path
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<u32>() {
            Ok(id) if trimmed.bytes().all(|b| b.is_ascii_digit()) => {
                Self::FileDataId(FileDataId::new(id))
            }
            _ => Self::Path(trimmed.to_string()),
        }
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::FileDataId(id) => write!(f, "FileDataId {id}"),
            Self::ContentKey(key) => write!(f, "content key {key}"),
            Self::EncodingKey(key) => write!(f, "encoding key {key}"),
        }
    }
}

impl From<FileDataId> for FileLocator {
    fn from(id: FileDataId) -> Self {
        Self::FileDataId(id)
    }
}

impl From<ContentKey> for FileLocator {
    fn from(key: ContentKey) -> Self {
        Self::ContentKey(key)
    }
}

impl From<EncodingKey> for FileLocator {
    fn from(key: EncodingKey) -> Self {
        Self::EncodingKey(key)
    }
}

/// Snapshot of what the reader has loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Current state
    pub state: StorageState,
    /// Index files loaded
    pub index_files: usize,
    /// Index files skipped
    pub index_files_skipped: usize,
    /// Unique index keys
    pub index_entries: usize,
    /// Archives currently open
    pub archives_open: usize,
    /// Content keys in the encoding table
    pub encoding_entries: usize,
    /// Roots merged
    pub roots_loaded: usize,
    /// Known paths
    pub root_paths: usize,
    /// Known `FileDataId`s
    pub root_ids: usize,
    /// Known name hashes
    pub root_name_hashes: usize,
}

// Index entries making up one file, plus the content key to verify against
#[derive(Debug)]
struct Located {
    entries: Vec<IndexEntry>,
    content_key: Option<ContentKey>,
}

/// Read-only view of a local storage
pub struct StorageReader {
    config: StorageConfig,
    observer: Arc<dyn StorageObserver>,
    state: StorageState,
    index: IndexStore,
    archives: ArchiveDataReader,
    encoding: Option<EncodingTable>,
    roots: Option<RootTable>,
    manifest: Option<BuildManifest>,
}

impl fmt::Debug for StorageReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageReader")
            .field("base_path", &self.config.base_path)
            .field("state", &self.state)
            .field("index_entries", &self.index.len())
            .field("has_encoding", &self.encoding.is_some())
            .field("has_roots", &self.roots.is_some())
            .finish_non_exhaustive()
    }
}

impl StorageReader {
    /// Open a storage, logging lifecycle events through `tracing`
    pub async fn open(config: StorageConfig) -> Result<Self> {
        Self::open_with_observer(config, Arc::new(TracingObserver)).await
    }

    /// Open a storage, reporting lifecycle events to `observer`
    ///
    /// Fails only when no index can be loaded. A missing build manifest,
    /// encoding table or root leaves the reader in a degraded but usable
    /// state.
    pub async fn open_with_observer(
        config: StorageConfig,
        observer: Arc<dyn StorageObserver>,
    ) -> Result<Self> {
        let data_dir = config.data_dir();
        info!("Opening storage at {}", config.base_path.display());

        let options = IndexLoadOptions {
            verify_checksums: config.verify_checksums,
            parallel: config.parallel_index_load,
        };
        let (index, manifest) = tokio::join!(
            IndexStore::load(&data_dir, options, observer.as_ref()),
            build_manifest::resolve(&config.base_path, config.product.as_deref()),
        );

        let mut reader = Self {
            archives: ArchiveDataReader::new(&data_dir, config.enable_mmap),
            config,
            observer,
            state: StorageState::Uninitialized,
            index: index?,
            encoding: None,
            roots: None,
            manifest: None,
        };
        reader.transition(StorageState::IndexLoaded);

        match manifest {
            Ok(manifest) => reader.manifest = Some(manifest),
            Err(e) => reader.observer.encoding_failed(&e),
        }
        if reader.manifest.is_some() {
            reader.load_encoding();
            reader.load_roots();
        }
        reader.load_listfile().await;

        reader.transition(StorageState::Ready);
        Ok(reader)
    }

    fn transition(&mut self, to: StorageState) {
        let from = self.state;
        self.state = to;
        self.observer.state_changed(from, to);
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_depth: self.config.max_blte_depth,
            verify_checksums: self.config.verify_checksums,
        }
    }

    fn load_encoding(&mut self) {
        let Some(key_hex) = self
            .manifest
            .as_ref()
            .and_then(BuildManifest::encoding_key)
            .map(str::to_string)
        else {
            let error = StorageError::NotFound("encoding key in build configuration".to_string());
            self.observer.encoding_failed(&error);
            return;
        };

        // No encoding table exists yet, so the key is read as a storage key
        let table = decode_hex_key(&key_hex)
            .and_then(|key| self.read_storage_key(&key))
            .and_then(|data| EncodingTable::parse(&data, self.config.verify_checksums));
        match table {
            Ok(table) => {
                self.observer.encoding_loaded(table.len());
                self.encoding = Some(table);
                self.transition(StorageState::EncodingLoaded);
            }
            Err(e) => self.observer.encoding_failed(&e),
        }
    }

    fn load_roots(&mut self) {
        let Some(manifest) = &self.manifest else {
            return;
        };
        let sources: Vec<(String, String)> = manifest
            .root_sources(self.config.include_legacy_root)
            .into_iter()
            .map(|info| (info.lookup_key().to_string(), info.content_key.clone()))
            .collect();
        if sources.is_empty() {
            debug!("Build configuration names no roots");
            return;
        }

        let mut table = RootTable::new();
        for (lookup_key, content_key) in &sources {
            let parsed = self
                .read_root_blob(lookup_key, content_key)
                .and_then(|data| parse_root_blob(&data));
            match parsed {
                Ok(root) => {
                    let summary = table.merge(lookup_key, &root, self.config.locale_mask);
                    self.observer.root_merged(&summary);
                }
                Err(e) => self.observer.root_failed(lookup_key, &e),
            }
        }

        if table.roots_loaded() > 0 {
            self.roots = Some(table);
            self.transition(StorageState::RootsLoaded);
        }
    }

    // Producers publish either key type: try a storage key first, then a
    // content key through the encoding table
    fn read_root_blob(&self, lookup_key: &str, content_key: &str) -> Result<Vec<u8>> {
        match decode_hex_key(lookup_key).and_then(|key| self.read_storage_key(&key)) {
            Err(e) if e.is_not_found() => {
                debug!("Root {} is not a storage key, trying {} as content key", lookup_key, content_key);
                let content_key = ContentKey::from_hex(content_key)
                    .map_err(|e| StorageError::Config(format!("root key {content_key}: {e}")))?;
                self.read_content(&content_key)
            }
            other => other,
        }
    }

    async fn load_listfile(&mut self) {
        let Some(path) = self.config.listfile.clone() else {
            return;
        };
        let Some(roots) = self.roots.as_mut() else {
            debug!("No roots loaded, ignoring listfile {}", path.display());
            return;
        };
        match tokio::fs::read(&path).await {
            Ok(data) => {
                let listfile = Listfile::parse(&data);
                let added = roots.apply_listfile(&listfile);
                info!(
                    "Listfile {}: {} paths attached, {} lines skipped",
                    path.display(),
                    added,
                    listfile.skipped
                );
            }
            Err(e) => warn!("Failed to read listfile {}: {}", path.display(), e),
        }
    }

    fn read_entry(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let payload = self.archives.read_payload(entry)?;
        Ok(blte::decode_with_options(&payload, &self.decode_options())?)
    }

    fn read_storage_key(&self, key: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .index
            .find_entry(key)
            .ok_or_else(|| StorageError::NotFound(format!("storage key {}", hex::encode(key))))?;
        self.read_entry(entry)
    }

    fn read_content(&self, content_key: &ContentKey) -> Result<Vec<u8>> {
        let located = self.locate_content(content_key)?;
        self.read_located(&located)
    }

    fn locate_content(&self, content_key: &ContentKey) -> Result<Located> {
        if let Some(keys) = self.encoding.as_ref().and_then(|t| t.lookup(content_key)) {
            for key in keys {
                if let Some(entry) = self.index.find_entry(key.significant()) {
                    return Ok(Located {
                        entries: vec![*entry],
                        content_key: Some(*content_key),
                    });
                }
            }
            return Err(StorageError::NotFound(format!(
                "content key {content_key} has no local storage key"
            )));
        }

        // Older storages address some files by content key directly
        self.index
            .find_entry(content_key.as_bytes())
            .map(|entry| Located {
                entries: vec![*entry],
                content_key: None,
            })
            .ok_or_else(|| StorageError::NotFound(format!("content key {content_key}")))
    }

    fn locate_target(&self, target: &RootTarget) -> Result<Located> {
        match target {
            RootTarget::Content(content_key) => self.locate_content(content_key),
            RootTarget::Encoded(keys) => {
                let entries = keys
                    .iter()
                    .map(|key| {
                        self.index.find_entry(key.significant()).copied().ok_or_else(|| {
                            StorageError::NotFound(format!("storage key {key}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Located {
                    entries,
                    content_key: None,
                })
            }
        }
    }

    fn locate(&self, locator: &FileLocator) -> Result<Located> {
        match locator {
            FileLocator::Path(path) => {
                if let Some(target) = self.roots.as_ref().and_then(|r| r.lookup_path(path)) {
                    return self.locate_target(target);
                }
                let Some(key) = hex_file_name(path) else {
                    return Err(StorageError::NotFound(format!("path {path}")));
                };
                self.locate_content(&ContentKey::from_bytes(key))
            }
            FileLocator::FileDataId(id) => {
                let target = self
                    .roots
                    .as_ref()
                    .and_then(|r| r.lookup_id(*id))
                    .ok_or_else(|| StorageError::NotFound(format!("FileDataId {id}")))?;
                self.locate_target(target)
            }
            FileLocator::ContentKey(content_key) => self.locate_content(content_key),
            FileLocator::EncodingKey(key) => self
                .index
                .find_entry(key.significant())
                .map(|entry| Located {
                    entries: vec![*entry],
                    content_key: None,
                })
                .ok_or_else(|| StorageError::NotFound(format!("encoding key {key}"))),
        }
    }

    fn read_located(&self, located: &Located) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for entry in &located.entries {
            data.extend_from_slice(&self.read_entry(entry)?);
        }

        if let (true, Some(expected)) = (self.config.verify_content, located.content_key) {
            let actual = ContentKey::from_data(&data);
            if actual != expected {
                return Err(StorageError::ChecksumMismatch {
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                });
            }
        }
        Ok(data)
    }

    /// Read and decode a file
    ///
    /// A file absent from local storage is [`StorageError::NotFound`].
    pub fn resolve(&self, locator: &FileLocator) -> Result<Vec<u8>> {
        let result = self
            .locate(locator)
            .and_then(|located| self.read_located(&located));
        if let Err(e) = &result {
            self.observer.extraction_failed(locator, e);
        }
        result
    }

    /// Whether `locator` resolves to an index entry
    pub fn contains(&self, locator: &FileLocator) -> bool {
        self.locate(locator).is_ok()
    }

    /// Known paths starting with `prefix`
    pub fn list_paths(&self, prefix: &str) -> Vec<&str> {
        self.roots
            .as_ref()
            .map_or_else(Vec::new, |roots| roots.list_paths(prefix))
    }

    /// Known paths containing `needle`
    pub fn search_paths(&self, needle: &str) -> Vec<&str> {
        self.roots
            .as_ref()
            .map_or_else(Vec::new, |roots| roots.search_paths(needle))
    }

    /// Raw bytes of an archive range, undecoded
    pub fn read_raw(&self, archive_id: u16, offset: u64, size: u32) -> Result<Vec<u8>> {
        self.archives.read(archive_id, offset, size)
    }

    /// Current state
    pub const fn state(&self) -> StorageState {
        self.state
    }

    /// Whether the encoding table loaded
    pub const fn has_encoding(&self) -> bool {
        self.encoding.is_some()
    }

    /// Whether at least one root loaded
    pub const fn has_roots(&self) -> bool {
        self.roots.is_some()
    }

    /// Build manifest, when `.build.info` resolved
    pub const fn manifest(&self) -> Option<&BuildManifest> {
        self.manifest.as_ref()
    }

    /// Loaded index files
    pub const fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Configuration the reader was opened with
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Statistics over the loaded layers
    pub fn stats(&self) -> StorageStats {
        let summary = self.index.summary();
        let roots = self.roots.as_ref();
        StorageStats {
            state: self.state,
            index_files: summary.files_loaded,
            index_files_skipped: summary.files_skipped,
            index_entries: self.index.len(),
            archives_open: self.archives.open_count(),
            encoding_entries: self.encoding.as_ref().map_or(0, EncodingTable::len),
            roots_loaded: roots.map_or(0, RootTable::roots_loaded),
            root_paths: roots.map_or(0, RootTable::path_count),
            root_ids: roots.map_or(0, RootTable::id_count),
            root_name_hashes: roots.map_or(0, RootTable::name_hash_count),
        }
    }

    /// Release every open archive; later reads reopen them
    pub fn close(&self) {
        self.archives.close();
    }
}

fn decode_hex_key(key: &str) -> Result<Vec<u8>> {
    hex::decode(key.trim()).map_err(|e| StorageError::Config(format!("invalid key '{key}': {e}")))
}

/// Key named by a path's last component, when it is 32 hex digits
///
/// An extension is ignored, so `data/0123...cdef.blp` names the key too.
pub fn hex_file_name(path: &str) -> Option<[u8; 16]> {
    let name = path.rsplit(['/', '\\']).next()?;
    let stem = name.split('.').next()?;
    if stem.len() != 32 {
        return None;
    }
    let mut key = [0u8; 16];
    hex::decode_to_slice(stem, &mut key).ok()?;
    Some(key)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::{IndexLayout, IndexWriter};
    use crate::observer::NoopObserver;
    use casc_reader_formats::blte::{BlteBuilder, CompressionMode};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_locator_parsing() {
        assert_eq!(
            FileLocator::parse(" 1234 "),
            FileLocator::FileDataId(FileDataId::new(1234))
        );
        assert_eq!(
            FileLocator::parse("world/maps/azeroth.wdt"),
            FileLocator::Path("world/maps/azeroth.wdt".to_string())
        );
        assert_eq!(FileLocator::parse("+12"), FileLocator::Path("+12".to_string()));
        assert_eq!(
            FileLocator::parse("99999999999"),
            FileLocator::Path("99999999999".to_string())
        );
        assert_eq!(FileLocator::parse("7").to_string(), "FileDataId 7");
    }

    #[test]
    fn test_hex_file_name() {
        let hex = "00112233445566778899aabbccddeeff";
        let expected = ContentKey::from_hex(hex).unwrap();
        assert_eq!(hex_file_name(hex), Some(*expected.as_bytes()));
        assert_eq!(
            hex_file_name(&format!("Data\\cache\\{hex}.blp")),
            Some(*expected.as_bytes())
        );
        assert!(hex_file_name("world/maps/azeroth.wdt").is_none());
        assert!(hex_file_name("zz112233445566778899aabbccddeeff").is_none());
    }

    #[derive(Default)]
    struct StateRecorder(Mutex<Vec<StorageState>>);

    impl StorageObserver for StateRecorder {
        fn state_changed(&self, _from: StorageState, to: StorageState) {
            self.0.lock().unwrap().push(to);
        }
    }

    // Index and archive only: no .build.info
    fn bare_storage(payloads: &[([u8; 16], &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().join("Data").join("data");
        std::fs::create_dir_all(&data_dir).expect("mkdir");

        let mut archive = Vec::new();
        let mut writer = IndexWriter::new(IndexLayout::VariableWidth);
        for (key, content) in payloads {
            let blte = BlteBuilder::new()
                .single(content, CompressionMode::ZLib)
                .build()
                .expect("blte");
            writer.add_entry(key, 0, archive.len() as u32, blte.len() as u32);
            archive.extend_from_slice(&blte);
        }
        std::fs::write(data_dir.join("data.000"), archive).expect("write");
        std::fs::write(data_dir.join(writer.file_name(1)), writer.build()).expect("write");
        dir
    }

    #[tokio::test]
    async fn test_degraded_open_without_build_info() {
        let key = [0x5a; 16];
        let dir = bare_storage(&[(key, b"loose file")]);
        let recorder = Arc::new(StateRecorder::default());

        let reader = StorageReader::open_with_observer(StorageConfig::new(dir.path()), recorder.clone())
            .await
            .expect("open");

        assert_eq!(reader.state(), StorageState::Ready);
        assert!(!reader.has_encoding());
        assert!(!reader.has_roots());
        assert!(reader.manifest().is_none());
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![StorageState::IndexLoaded, StorageState::Ready]
        );

        let by_key = EncodingKey::from_bytes(key);
        assert_eq!(reader.resolve(&by_key.into()).expect("resolve"), b"loose file");

        let path = FileLocator::Path(format!("cache/{}", hex::encode(key)));
        assert_eq!(reader.resolve(&path).expect("resolve"), b"loose file");

        let missing = reader.resolve(&FileLocator::parse("12")).unwrap_err();
        assert!(missing.is_not_found());
        assert!(!reader.contains(&FileLocator::parse("interface/missing.lua")));
        assert!(reader.list_paths("").is_empty());
    }

    #[tokio::test]
    async fn test_open_fails_without_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("Data").join("data")).expect("mkdir");
        let result =
            StorageReader::open_with_observer(StorageConfig::new(dir.path()), Arc::new(NoopObserver))
                .await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stats_and_close() {
        let dir = bare_storage(&[([1; 16], b"a"), ([2; 16], b"bb")]);
        let reader = StorageReader::open_with_observer(
            StorageConfig::new(dir.path()).with_mmap(false),
            Arc::new(NoopObserver),
        )
        .await
        .expect("open");

        reader
            .resolve(&EncodingKey::from_bytes([2; 16]).into())
            .expect("resolve");
        let stats = reader.stats();
        assert_eq!(stats.index_files, 1);
        assert_eq!(stats.index_entries, 2);
        assert_eq!(stats.archives_open, 1);
        assert_eq!(stats.encoding_entries, 0);

        assert_eq!(&reader.read_raw(0, 0, 4).expect("raw"), b"BLTE");
        reader.close();
        assert_eq!(reader.stats().archives_open, 0);
    }
}
