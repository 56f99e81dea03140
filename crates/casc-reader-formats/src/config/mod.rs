//! Build configuration text blobs
//!
//! A build configuration is `key = value [value...]` per line. It names the
//! encoding table and the root manifests of one build.

mod build_config;

pub use build_config::{BuildConfig, BuildInfo, VfsRoot};

use thiserror::Error;

/// Configuration parsing errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Text is not UTF-8
    #[error("configuration is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type for configuration parsing
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Split a `key = value` line
pub(crate) fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    is_valid_key(key).then(|| (key, value.trim()))
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check for a 32 hex digit key
pub fn is_valid_md5_hex(hash: &str) -> bool {
    hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit())
}
