//! Build configuration: which encoding table and roots make up a build

use super::{ConfigResult, parse_line};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Build configuration entries
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    entries: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

/// Content key and optional encoding key of a referenced file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Content key (hex)
    pub content_key: String,
    /// Encoding key (hex), when published
    pub encoding_key: Option<String>,
}

impl BuildInfo {
    /// Key to look the file up with: the encoding key when present
    pub fn lookup_key(&self) -> &str {
        self.encoding_key.as_deref().unwrap_or(&self.content_key)
    }
}

/// A `vfs-root` or `vfs-N` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsRoot {
    /// Field name
    pub name: String,
    /// Referenced file
    pub info: BuildInfo,
}

impl BuildConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration blob; unknown lines are ignored
    pub fn parse(data: &[u8]) -> ConfigResult<Self> {
        let text = std::str::from_utf8(data)?;
        let mut config = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = parse_line(line) {
                config.set(key, value.split_whitespace().map(String::from).collect());
            }
        }
        Ok(config)
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, key: &str, values: Vec<String>) -> &mut Self {
        if self.entries.insert(key.to_string(), values).is_none() {
            self.order.push(key.to_string());
        }
        self
    }

    /// Tokens of a field
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    fn info(&self, key: &str) -> Option<BuildInfo> {
        let values = self.entries.get(key)?;
        Some(BuildInfo {
            content_key: values.first()?.clone(),
            encoding_key: values.get(1).cloned(),
        })
    }

    /// Legacy single root manifest
    pub fn root(&self) -> Option<BuildInfo> {
        self.info("root")
    }

    /// Encoding table
    pub fn encoding(&self) -> Option<BuildInfo> {
        self.info("encoding")
    }

    /// `vfs-root` first, then `vfs-N` in numeric order
    ///
    /// `-size` fields and other `vfs-` fields with a non-numeric suffix are
    /// not roots.
    pub fn vfs_roots(&self) -> Vec<VfsRoot> {
        let mut numbered: Vec<(u32, &str)> = self
            .entries
            .keys()
            .filter_map(|key| {
                let n = key.strip_prefix("vfs-")?.parse::<u32>().ok()?;
                Some((n, key.as_str()))
            })
            .collect();
        numbered.sort_unstable();

        std::iter::once("vfs-root")
            .chain(numbered.into_iter().map(|(_, key)| key))
            .filter_map(|key| {
                Some(VfsRoot {
                    name: key.to_string(),
                    info: self.info(key)?,
                })
            })
            .collect()
    }

    /// `build-name`
    pub fn build_name(&self) -> Option<&str> {
        self.entries
            .get("build-name")
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Serialise in insertion order
    pub fn build(&self) -> Vec<u8> {
        let mut output = String::from("# Build Configuration\n\n");
        for key in &self.order {
            if let Some(values) = self.entries.get(key) {
                let _ = writeln!(output, "{key} = {}", values.join(" "));
            }
        }
        output.into_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = "# Build Configuration

root = 11111111111111111111111111111111
encoding = 22222222222222222222222222222222 33333333333333333333333333333333
encoding-size = 1000 900
vfs-root = 44444444444444444444444444444444 55555555555555555555555555555555
vfs-root-size = 10 9
vfs-10 = aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb
vfs-2 = cccccccccccccccccccccccccccccccc dddddddddddddddddddddddddddddddd
vfs-2-size = 1 1
vfs-1 = eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee
build-name = WOW-56421patch11.0.2_Retail
";

    #[test]
    fn test_encoding_prefers_second_token() {
        let config = BuildConfig::parse(CONFIG.as_bytes()).expect("parse");
        let encoding = config.encoding().expect("encoding");
        assert_eq!(encoding.lookup_key(), "33333333333333333333333333333333");
        assert_eq!(encoding.content_key, "22222222222222222222222222222222");

        let root = config.root().expect("root");
        assert_eq!(root.lookup_key(), "11111111111111111111111111111111");
        assert_eq!(config.build_name(), Some("WOW-56421patch11.0.2_Retail"));
    }

    #[test]
    fn test_vfs_root_order() {
        let config = BuildConfig::parse(CONFIG.as_bytes()).expect("parse");
        let names: Vec<String> = config.vfs_roots().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["vfs-root", "vfs-1", "vfs-2", "vfs-10"]);

        let roots = config.vfs_roots();
        assert_eq!(roots[1].info.lookup_key(), "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
        assert_eq!(roots[3].info.lookup_key(), "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    }

    #[test]
    fn test_build_round_trip() {
        let mut config = BuildConfig::new();
        config
            .set("root", vec!["ab".into()])
            .set("vfs-root", vec!["cd".into(), "ef".into()]);
        let parsed = BuildConfig::parse(&config.build()).expect("parse");
        assert_eq!(parsed.get("vfs-root"), Some(&["cd".to_string(), "ef".to_string()][..]));
        assert!(parsed.encoding().is_none());
    }
}
