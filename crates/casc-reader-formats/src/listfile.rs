//! Community listfile parser
//!
//! Block manifests only carry name hashes, so paths cannot be listed from
//! them. A listfile fills the gap with `FileDataId;path` lines.
//!
//! ```
//! use casc_reader_formats::listfile::Listfile;
//! use casc_reader_crypto::FileDataId;
//!
//! let listfile = Listfile::parse(b"# comment\n53187;Sound\\Music\\ZoneMusic.mp3\n");
//! assert_eq!(
//!     listfile.entries,
//!     vec![(FileDataId::new(53187), "sound/music/zonemusic.mp3".to_string())]
//! );
//! ```

use casc_reader_crypto::FileDataId;

/// Parsed listfile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listfile {
    /// Entries in file order, paths normalised
    pub entries: Vec<(FileDataId, String)>,
    /// Number of lines that could not be parsed
    pub skipped: usize,
}

impl Listfile {
    /// Parse listfile text; malformed lines are counted and skipped
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut listfile = Self::default();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(entry) => listfile.entries.push(entry),
                None => listfile.skipped += 1,
            }
        }
        listfile
    }
}

fn parse_line(line: &str) -> Option<(FileDataId, String)> {
    let (id, rest) = line.split_once(';')?;
    let id = id.trim().parse::<u32>().ok()?;
    // Extra fields after the path are ignored
    let path = rest.split(';').next().unwrap_or_default();
    let path = normalise_path(path);
    (!path.is_empty()).then_some((FileDataId::new(id), path))
}

/// Lower-case, `/`-separated form used as the path key
///
/// Backslashes become slashes and empty segments are dropped.
pub fn normalise_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
        .to_ascii_lowercase()
}
