//! Configuration for the storage reader

use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the storage reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Installation root (the directory containing `Data/`)
    pub base_path: PathBuf,

    /// Product tag selecting the `.build.info` row
    pub product: Option<String>,

    /// Enable memory-mapped I/O for archives
    pub enable_mmap: bool,

    /// Verify BLTE chunk, encoding page and index header checksums
    pub verify_checksums: bool,

    /// Compare the MD5 of extracted content against its content key
    pub verify_content: bool,

    /// Maximum nesting of `F` chunks
    pub max_blte_depth: usize,

    /// Merge the legacy `root` after the VFS roots when both exist
    pub include_legacy_root: bool,

    /// Only merge root blocks whose locale intersects this mask
    pub locale_mask: Option<u32>,

    /// `FileDataId;path` listfile applied after the roots load
    pub listfile: Option<PathBuf>,

    /// Parse index files concurrently on blocking tasks
    pub parallel_index_load: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            product: None,
            enable_mmap: true,
            verify_checksums: false,
            verify_content: false,
            max_blte_depth: casc_reader_formats::blte::DEFAULT_MAX_DEPTH,
            include_legacy_root: false,
            locale_mask: None,
            listfile: None,
            parallel_index_load: true,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the specified base path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Load a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// `Data/data`, where index files and archives live
    pub fn data_dir(&self) -> PathBuf {
        self.base_path
            .join(crate::DEFAULT_DATA_DIR)
            .join(crate::DATA_DIR)
    }

    /// Set the base path for storage
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.base_path = path.as_ref().to_path_buf();
        self
    }

    /// Select the `.build.info` row by product tag
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Enable or disable memory-mapped archives
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.enable_mmap = enable;
        self
    }

    /// Enable or disable checksum verification
    #[must_use]
    pub const fn with_verify_checksums(mut self, enable: bool) -> Self {
        self.verify_checksums = enable;
        self
    }

    /// Enable or disable content key verification
    #[must_use]
    pub const fn with_verify_content(mut self, enable: bool) -> Self {
        self.verify_content = enable;
        self
    }

    /// Set the nested BLTE depth limit
    #[must_use]
    pub const fn with_max_blte_depth(mut self, depth: usize) -> Self {
        self.max_blte_depth = depth;
        self
    }

    /// Also merge the legacy root after VFS roots
    #[must_use]
    pub const fn with_legacy_root(mut self, include: bool) -> Self {
        self.include_legacy_root = include;
        self
    }

    /// Restrict block manifests to a locale mask
    #[must_use]
    pub const fn with_locale_mask(mut self, mask: u32) -> Self {
        self.locale_mask = Some(mask);
        self
    }

    /// Apply a listfile after the roots load
    #[must_use]
    pub fn with_listfile<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.listfile = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable concurrent index parsing
    #[must_use]
    pub const fn with_parallel_index_load(mut self, enable: bool) -> Self {
        self.parallel_index_load = enable;
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StorageConfig::from_json_str(
            r#"{ "base_path": "/games/wow", "product": "wow_classic", "locale_mask": 2 }"#,
        )
        .expect("config");

        assert_eq!(
            config,
            StorageConfig::new("/games/wow")
                .with_product("wow_classic")
                .with_locale_mask(2)
        );
        assert_eq!(config.max_blte_depth, 4);
        assert!(config.enable_mmap);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("storage.json");
        let config = StorageConfig::new("install")
            .with_verify_content(true)
            .with_listfile("listfile.csv");
        std::fs::write(&path, serde_json::to_string(&config).expect("json")).expect("write");

        assert_eq!(StorageConfig::from_json_file(&path).expect("load"), config);
        assert_eq!(config.data_dir(), PathBuf::from("install/Data/data"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StorageConfig::from_json_str("{ \"enable_mmap\": \"yes\" }"),
            Err(StorageError::Config(_))
        ));
    }
}
