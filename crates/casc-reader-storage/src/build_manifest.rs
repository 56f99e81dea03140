//! Locating the current build: `.build.info` and the build configuration
//!
//! `.build.info` is a BPSV table at the installation root (or under
//! `Data/`). The selected row's `Build Key` names a build configuration blob
//! stored at `Data/config/<xx>/<yy>/<key>`, which in turn names the encoding
//! table and the roots.
//!
//! Known `.build.info` columns used here:
//! - `Build Key!HEX:16` -- build configuration hash
//! - `Product!STRING:0` -- product code (e.g., "wow", "wow_classic")
//! - `Version!STRING:0` -- build version string

use crate::{BUILD_INFO_FILE, CONFIG_DIR, DEFAULT_DATA_DIR, Result, StorageError};
use casc_reader_formats::bpsv::{self, BpsvDocument};
use casc_reader_formats::config::{BuildConfig, BuildInfo, is_valid_md5_hex};
use std::path::{Path, PathBuf};
use tracing::debug;

const BUILD_KEY_COLUMN: &str = "Build Key";
const PRODUCT_COLUMN: &str = "Product";
const VERSION_COLUMN: &str = "Version";

/// What the build configuration says makes up the current build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildManifest {
    /// Build configuration key (hex)
    pub build_key: String,
    /// Product of the selected `.build.info` row
    pub product: Option<String>,
    /// Version of the selected `.build.info` row
    pub version: Option<String>,
    /// `build-name` of the configuration
    pub build_name: Option<String>,
    /// `encoding` field
    pub encoding: Option<BuildInfo>,
    /// `vfs-root` then `vfs-N` fields, in merge order
    pub vfs_roots: Vec<BuildInfo>,
    /// Legacy `root` field
    pub legacy_root: Option<BuildInfo>,
}

impl BuildManifest {
    /// Build a manifest from a parsed build configuration
    pub fn from_config(build_key: &str, config: &BuildConfig) -> Self {
        Self {
            build_key: build_key.to_string(),
            product: None,
            version: None,
            build_name: config.build_name().map(str::to_string),
            encoding: config.encoding(),
            vfs_roots: config.vfs_roots().into_iter().map(|root| root.info).collect(),
            legacy_root: config.root(),
        }
    }

    /// Key the encoding table is looked up with: second token, else first
    pub fn encoding_key(&self) -> Option<&str> {
        self.encoding.as_ref().map(BuildInfo::lookup_key)
    }

    /// Roots to merge, in priority order
    ///
    /// VFS roots win over the legacy root, which is only used when there are
    /// no VFS roots or `include_legacy` asks for it as a last resort.
    pub fn root_sources(&self, include_legacy: bool) -> Vec<&BuildInfo> {
        let mut sources: Vec<&BuildInfo> = self.vfs_roots.iter().collect();
        if sources.is_empty() || include_legacy {
            sources.extend(self.legacy_root.as_ref());
        }
        sources
    }
}

/// Index of the row for `product`, else of the last row
pub fn select_build_row(document: &BpsvDocument, product: Option<&str>) -> Result<usize> {
    if document.row_count() == 0 {
        return Err(StorageError::Config(".build.info has no rows".to_string()));
    }
    let matched = product.and_then(|product| document.find_row(PRODUCT_COLUMN, product));
    if let (None, Some(product)) = (matched, product) {
        debug!("No .build.info row for product {}, using the last row", product);
    }
    Ok(matched.unwrap_or(document.row_count() - 1))
}

/// Path of a config blob: `<data>/config/<key[0..2]>/<key[2..4]>/<key>`
pub fn config_path(data_root: &Path, key: &str) -> Result<PathBuf> {
    let key = key.to_ascii_lowercase();
    if !is_valid_md5_hex(&key) {
        return Err(StorageError::Config(format!("invalid config key '{key}'")));
    }
    Ok(data_root
        .join(CONFIG_DIR)
        .join(&key[0..2])
        .join(&key[2..4])
        .join(&key))
}

async fn read_build_info(base_path: &Path) -> Result<(PathBuf, Vec<u8>)> {
    let candidates = [
        base_path.join(BUILD_INFO_FILE),
        base_path.join(DEFAULT_DATA_DIR).join(BUILD_INFO_FILE),
    ];
    for path in candidates {
        match tokio::fs::read(&path).await {
            Ok(data) => return Ok((path, data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(StorageError::NotFound(format!(
        "{BUILD_INFO_FILE} under {}",
        base_path.display()
    )))
}

/// Resolve the current build of the installation at `base_path`
pub async fn resolve(base_path: &Path, product: Option<&str>) -> Result<BuildManifest> {
    let (info_path, data) = read_build_info(base_path).await?;
    let document = bpsv::parse_bytes(&data)?;
    let row = select_build_row(&document, product)?;

    let build_key = document
        .get(row, BUILD_KEY_COLUMN)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            StorageError::Config(format!(
                "{} row {row} has no {BUILD_KEY_COLUMN}",
                info_path.display()
            ))
        })?
        .to_string();

    let path = config_path(&base_path.join(DEFAULT_DATA_DIR), &build_key)?;
    let config_data = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(format!("build config {}", path.display()))
        } else {
            StorageError::Io(e)
        }
    })?;
    let config = BuildConfig::parse(&config_data)?;

    let mut manifest = BuildManifest::from_config(&build_key, &config);
    manifest.product = document.get(row, PRODUCT_COLUMN).map(str::to_string);
    manifest.version = document.get(row, VERSION_COLUMN).map(str::to_string);
    debug!(
        "Build {} ({}): {} VFS roots, legacy root {}",
        manifest.build_key,
        manifest.build_name.as_deref().unwrap_or("unnamed"),
        manifest.vfs_roots.len(),
        manifest.legacy_root.is_some()
    );
    Ok(manifest)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BUILD_INFO: &str = "Branch!STRING:0|Build Key!HEX:16|Product!STRING:0|Version!STRING:0\n\
        us|0123456789abcdef0123456789abcdef|wow|11.0.2.56313\n\
        us|fedcba9876543210fedcba9876543210|wow_classic|1.15.3.55646\n";

    fn write_install(build_info_in_data: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("Data");
        let info_path = if build_info_in_data {
            data.join(BUILD_INFO_FILE)
        } else {
            dir.path().join(BUILD_INFO_FILE)
        };
        std::fs::create_dir_all(&data).expect("mkdir");
        std::fs::write(info_path, BUILD_INFO).expect("write");

        for (key, name) in [
            ("0123456789abcdef0123456789abcdef", "retail"),
            ("fedcba9876543210fedcba9876543210", "classic"),
        ] {
            let path = config_path(&data, key).expect("path");
            std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
            let mut config = BuildConfig::new();
            config
                .set("build-name", vec![name.to_string()])
                .set("root", vec!["11".repeat(16)])
                .set("encoding", vec!["22".repeat(16), "33".repeat(16)])
                .set("vfs-root", vec!["44".repeat(16), "55".repeat(16)])
                .set("vfs-2", vec!["88".repeat(16), "99".repeat(16)])
                .set("vfs-1", vec!["66".repeat(16), "77".repeat(16)]);
            std::fs::write(path, config.build()).expect("write");
        }
        dir
    }

    #[tokio::test]
    async fn test_selects_row_by_product() {
        let dir = write_install(false);
        let manifest = resolve(dir.path(), Some("wow_classic")).await.expect("resolve");

        assert_eq!(manifest.build_key, "fedcba9876543210fedcba9876543210");
        assert_eq!(manifest.build_name.as_deref(), Some("classic"));
        assert_eq!(manifest.version.as_deref(), Some("1.15.3.55646"));
        assert_eq!(manifest.encoding_key(), Some("33".repeat(16).as_str()));
        let roots: Vec<&str> = manifest.vfs_roots.iter().map(BuildInfo::lookup_key).collect();
        assert_eq!(
            roots,
            vec!["55".repeat(16), "77".repeat(16), "99".repeat(16)]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_last_row() {
        let dir = write_install(true);
        for product in [None, Some("wowt")] {
            let manifest = resolve(dir.path(), product).await.expect("resolve");
            assert_eq!(manifest.product.as_deref(), Some("wow_classic"));
        }
    }

    #[tokio::test]
    async fn test_missing_build_info() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve(dir.path(), None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_root_sources_prefer_vfs_roots() {
        let mut config = BuildConfig::new();
        config.set("root", vec!["aa".repeat(16)]);
        let legacy_only = BuildManifest::from_config("k", &config);
        assert_eq!(legacy_only.root_sources(false).len(), 1);

        config.set("vfs-root", vec!["bb".repeat(16), "cc".repeat(16)]);
        let manifest = BuildManifest::from_config("k", &config);
        let keys: Vec<&str> = manifest
            .root_sources(false)
            .into_iter()
            .map(BuildInfo::lookup_key)
            .collect();
        assert_eq!(keys, vec!["cc".repeat(16)]);
        assert_eq!(manifest.root_sources(true).len(), 2);
    }

    #[test]
    fn test_config_path_layout() {
        let path = config_path(Path::new("Data"), "ABCDEF0123456789abcdef0123456789").expect("path");
        assert_eq!(
            path,
            Path::new("Data/config/ab/cd/abcdef0123456789abcdef0123456789")
        );
        assert!(config_path(Path::new("Data"), "short").is_err());
    }
}
