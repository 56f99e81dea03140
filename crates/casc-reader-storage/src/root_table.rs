//! Merged view over every loaded root
//!
//! Roots come in two shapes. Block manifests map `FileDataId`s and hashed
//! names to content keys; they never store the names themselves. TVFS roots
//! store real paths mapped to the encoding keys of their spans. Both merge
//! into one [`RootTable`], first-seen wins: a root loaded later never
//! replaces a mapping an earlier root already made.

use crate::Result;
use casc_reader_crypto::{ContentKey, EncodingKey, FileDataId, Jenkins96};
use casc_reader_formats::listfile::{Listfile, normalise_path};
use casc_reader_formats::root::RootFile;
use casc_reader_formats::tvfs::TvfsFile;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// What a root maps a locator to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootTarget {
    /// Content key, resolved through the encoding table
    Content(ContentKey),
    /// Storage keys of the file's spans, in file order
    Encoded(Vec<EncodingKey>),
}

/// A parsed root blob
#[derive(Debug, Clone)]
pub enum ParsedRoot {
    /// `MFST`/`TSFM` or headerless block manifest
    Block(RootFile),
    /// TVFS virtual file system root
    Vfs(TvfsFile),
}

impl ParsedRoot {
    /// Kind of root
    pub const fn kind(&self) -> RootKind {
        match self {
            Self::Block(_) => RootKind::Block,
            Self::Vfs(_) => RootKind::Vfs,
        }
    }
}

/// Kind of a merged root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RootKind {
    /// Block manifest
    Block,
    /// TVFS root
    Vfs,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Vfs => write!(f, "TVFS"),
        }
    }
}

/// Detect and parse a decoded root blob
pub fn parse_root_blob(data: &[u8]) -> Result<ParsedRoot> {
    if data.starts_with(b"TVFS") {
        Ok(ParsedRoot::Vfs(TvfsFile::parse(data)?))
    } else {
        Ok(ParsedRoot::Block(RootFile::parse(data)?))
    }
}

/// Outcome of merging one root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootMergeSummary {
    /// Key the root was loaded from
    pub source: String,
    /// Kind of root
    pub kind: RootKind,
    /// New path mappings
    pub added_paths: usize,
    /// New `FileDataId` mappings
    pub added_ids: usize,
    /// New name hash mappings
    pub added_name_hashes: usize,
    /// Mappings skipped because an earlier one exists
    pub duplicates: usize,
}

/// Path, name hash and `FileDataId` mappings across all merged roots
#[derive(Debug, Clone, Default)]
pub struct RootTable {
    paths: BTreeMap<String, RootTarget>,
    name_hashes: HashMap<u64, RootTarget>,
    ids: HashMap<FileDataId, RootTarget>,
    roots_loaded: usize,
}

impl RootTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed root loaded from `source`
    ///
    /// `locale_mask` restricts block manifests to blocks intersecting it.
    pub fn merge(
        &mut self,
        source: &str,
        root: &ParsedRoot,
        locale_mask: Option<u32>,
    ) -> RootMergeSummary {
        let mut summary = RootMergeSummary {
            source: source.to_string(),
            kind: root.kind(),
            added_paths: 0,
            added_ids: 0,
            added_name_hashes: 0,
            duplicates: 0,
        };

        match root {
            ParsedRoot::Block(file) => {
                let mask = locale_mask.unwrap_or(u32::MAX);
                for (_, record) in file.records_for_locale(mask) {
                    let target = RootTarget::Content(record.content_key);
                    if self.ids.contains_key(&record.file_data_id) {
                        summary.duplicates += 1;
                    } else {
                        self.ids.insert(record.file_data_id, target.clone());
                        summary.added_ids += 1;
                    }
                    let Some(hash) = record.name_hash else {
                        continue;
                    };
                    if self.name_hashes.contains_key(&hash) {
                        summary.duplicates += 1;
                    } else {
                        self.name_hashes.insert(hash, target);
                        summary.added_name_hashes += 1;
                    }
                }
            }
            ParsedRoot::Vfs(tvfs) => {
                for file in &tvfs.files {
                    let path = normalise_path(&file.path);
                    if self.paths.contains_key(&path) {
                        summary.duplicates += 1;
                    } else {
                        self.paths
                            .insert(path, RootTarget::Encoded(file.encoding_keys()));
                        summary.added_paths += 1;
                    }
                }
            }
        }

        self.roots_loaded += 1;
        summary
    }

    /// Attach listfile paths to known `FileDataId`s
    ///
    /// Returns the number of paths added. Ids no root knows are ignored.
    pub fn apply_listfile(&mut self, listfile: &Listfile) -> usize {
        let mut added = 0;
        for (id, path) in &listfile.entries {
            let Some(target) = self.ids.get(id) else {
                continue;
            };
            let path = normalise_path(path);
            if !self.paths.contains_key(&path) {
                self.paths.insert(path, target.clone());
                added += 1;
            }
        }
        added
    }

    /// Look up a path: real paths first, then the hashed name
    pub fn lookup_path(&self, path: &str) -> Option<&RootTarget> {
        let normalised = normalise_path(path);
        self.paths.get(&normalised).or_else(|| {
            self.name_hashes
                .get(&Jenkins96::hash_path(&normalised).hash64)
        })
    }

    /// Look up a `FileDataId`
    pub fn lookup_id(&self, id: FileDataId) -> Option<&RootTarget> {
        self.ids.get(&id)
    }

    /// Known paths starting with `prefix`, sorted
    pub fn list_paths(&self, prefix: &str) -> Vec<&str> {
        let prefix = normalise_prefix(prefix);
        self.paths
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Known paths containing `needle`, case-insensitive, sorted
    pub fn search_paths(&self, needle: &str) -> Vec<&str> {
        let needle = normalise_prefix(needle);
        self.paths
            .keys()
            .filter(|path| path.contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Number of known paths
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Number of known `FileDataId`s
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of known name hashes
    pub fn name_hash_count(&self) -> usize {
        self.name_hashes.len()
    }

    /// Number of roots merged so far
    pub fn roots_loaded(&self) -> usize {
        self.roots_loaded
    }

    /// Whether no root contributed any mapping
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.ids.is_empty() && self.name_hashes.is_empty()
    }
}

// Prefixes keep a trailing separator so "world/" does not match "worldmap"
fn normalise_prefix(prefix: &str) -> String {
    prefix
        .trim_start_matches(['/', '\\'])
        .replace('\\', "/")
        .to_ascii_lowercase()
}
