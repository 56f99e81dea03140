//! Lifecycle events of a storage reader
//!
//! Parsing and decoding report through errors only. The reader turns the
//! interesting moments into calls on a [`StorageObserver`], which callers
//! supply when opening the storage.

use crate::index::IndexLoadSummary;
use crate::reader::{FileLocator, StorageState};
use crate::root_table::RootMergeSummary;
use crate::StorageError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Receiver for storage lifecycle events
///
/// Every method defaults to doing nothing.
pub trait StorageObserver: Send + Sync {
    /// The reader moved between states
    fn state_changed(&self, _from: StorageState, _to: StorageState) {}

    /// Index files finished loading
    fn index_loaded(&self, _summary: &IndexLoadSummary) {}

    /// An index file was rejected; loading continued without it
    fn index_file_skipped(&self, _path: &Path, _error: &StorageError) {}

    /// The encoding table loaded
    fn encoding_loaded(&self, _entries: usize) {}

    /// The encoding table could not be loaded
    fn encoding_failed(&self, _error: &StorageError) {}

    /// A root was merged into the root table
    fn root_merged(&self, _summary: &RootMergeSummary) {}

    /// A root could not be loaded
    fn root_failed(&self, _key_hex: &str, _error: &StorageError) {}

    /// A resolve call failed
    fn extraction_failed(&self, _locator: &FileLocator, _error: &StorageError) {}
}

/// Observer forwarding every event to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StorageObserver for TracingObserver {
    fn state_changed(&self, from: StorageState, to: StorageState) {
        debug!("Storage state {:?} -> {:?}", from, to);
    }

    fn index_loaded(&self, summary: &IndexLoadSummary) {
        info!(
            "Loaded {} index files ({} skipped), {} entries, {} duplicate keys",
            summary.files_loaded, summary.files_skipped, summary.entries, summary.duplicate_keys
        );
    }

    fn index_file_skipped(&self, path: &Path, error: &StorageError) {
        warn!("Skipping index file {}: {}", path.display(), error);
    }

    fn encoding_loaded(&self, entries: usize) {
        info!("Loaded encoding table with {} content keys", entries);
    }

    fn encoding_failed(&self, error: &StorageError) {
        warn!("Encoding table unavailable: {}", error);
    }

    fn root_merged(&self, summary: &RootMergeSummary) {
        info!(
            "Merged {} root {}: {} paths, {} ids, {} name hashes, {} already present",
            summary.kind,
            summary.source,
            summary.added_paths,
            summary.added_ids,
            summary.added_name_hashes,
            summary.duplicates
        );
    }

    fn root_failed(&self, key_hex: &str, error: &StorageError) {
        warn!("Failed to load root {}: {}", key_hex, error);
    }

    fn extraction_failed(&self, locator: &FileLocator, error: &StorageError) {
        if error.is_not_found() {
            debug!("{} not in local storage", locator);
        } else {
            warn!("Failed to extract {}: {}", locator, error);
        }
    }
}

/// Observer discarding every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StorageObserver for NoopObserver {}
