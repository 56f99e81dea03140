//! TVFS path table: a prefix tree of path fragments
//!
//! Each node is an optional `0x00` pre-separator, a length-prefixed name
//! fragment, an optional `0x00` post-separator and then either `0xFF` with a
//! big-endian node value or nothing (an implicit separator before the next
//! fragment). A node value with bit 31 set is a folder whose low 31 bits give
//! its byte length, the 4-byte value included; any other value is the
//! offset of the file's VFS entry.

use crate::tvfs::error::{TvfsError, TvfsResult};

/// Node value bit marking a folder
pub const TVFS_FOLDER_NODE: u32 = 0x8000_0000;
/// Mask of the folder length
pub const TVFS_FOLDER_SIZE_MASK: u32 = 0x7FFF_FFFF;

/// Deepest folder nesting accepted by the parser
pub const MAX_FOLDER_DEPTH: usize = 256;

const SEPARATOR: u8 = b'/';

/// File leaf of the path tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFileEntry {
    /// Full path, `/` separated
    pub path: String,
    /// Offset of the VFS entry within the VFS table
    pub vfs_offset: u32,
}

struct PathNode<'a> {
    pre_separator: bool,
    name: &'a [u8],
    post_separator: bool,
    value: Option<u32>,
}

fn capture_node<'a>(data: &'a [u8], pos: &mut usize) -> TvfsResult<PathNode<'a>> {
    let mut node = PathNode {
        pre_separator: false,
        name: &[],
        post_separator: false,
        value: None,
    };

    if data.get(*pos) == Some(&0) {
        node.pre_separator = true;
        *pos += 1;
    }
    if let Some(&len) = data.get(*pos).filter(|&&b| b != 0xFF) {
        let start = *pos + 1;
        let end = start + usize::from(len);
        if end > data.len() {
            return Err(TvfsError::PathTableTruncated(*pos));
        }
        node.name = &data[start..end];
        *pos = end;
    }
    if data.get(*pos) == Some(&0) {
        node.post_separator = true;
        *pos += 1;
    }
    match data.get(*pos) {
        Some(0xFF) => {
            let value = data
                .get(*pos + 1..*pos + 5)
                .ok_or(TvfsError::PathTableTruncated(*pos))?;
            node.value = Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]));
            *pos += 5;
        }
        Some(_) => node.post_separator = true,
        None => {}
    }
    Ok(node)
}

fn push_separator(path: &mut Vec<u8>) {
    if path.last().is_some_and(|&b| b != SEPARATOR) {
        path.push(SEPARATOR);
    }
}

/// Walk one level of the tree, `data` being exactly that level's bytes
fn parse_level(
    data: &[u8],
    base: usize,
    depth: usize,
    path: &mut Vec<u8>,
    files: &mut Vec<PathFileEntry>,
) -> TvfsResult<()> {
    if depth > MAX_FOLDER_DEPTH {
        return Err(TvfsError::FolderTooDeep {
            offset: base,
            limit: MAX_FOLDER_DEPTH,
        });
    }
    let saved = path.len();
    let mut pos = 0;

    while pos < data.len() {
        let node_start = pos;
        let node = capture_node(data, &mut pos).map_err(|e| match e {
            TvfsError::PathTableTruncated(at) => TvfsError::PathTableTruncated(base + at),
            other => other,
        })?;
        if pos == node_start {
            return Err(TvfsError::PathTableTruncated(base + pos));
        }

        if node.pre_separator {
            push_separator(path);
        }
        path.extend_from_slice(node.name);
        if node.post_separator {
            push_separator(path);
        }

        let Some(value) = node.value else {
            continue;
        };
        if value & TVFS_FOLDER_NODE != 0 {
            let size = (value & TVFS_FOLDER_SIZE_MASK)
                .checked_sub(4)
                .ok_or(TvfsError::InvalidFolderSize {
                    offset: base + pos,
                    size: value & TVFS_FOLDER_SIZE_MASK,
                })? as usize;
            let folder = data
                .get(pos..pos + size)
                .ok_or(TvfsError::InvalidFolderSize {
                    offset: base + pos,
                    size: value & TVFS_FOLDER_SIZE_MASK,
                })?;
            parse_level(folder, base + pos, depth + 1, path, files)?;
            pos += size;
        } else {
            files.push(PathFileEntry {
                path: String::from_utf8_lossy(path).into_owned(),
                vfs_offset: value,
            });
        }
        path.truncate(saved);
    }
    Ok(())
}

/// Parse the whole path table into its file leaves
pub fn parse_path_table(data: &[u8]) -> TvfsResult<Vec<PathFileEntry>> {
    let mut files = Vec::new();
    parse_level(data, 0, 0, &mut Vec::new(), &mut files)?;
    Ok(files)
}

/// Serialise a tree level; paths are relative to the level and sorted
pub(crate) fn build_level(
    entries: &[(&str, u32)],
    nested: bool,
    out: &mut Vec<u8>,
) -> TvfsResult<()> {
    let mut i = 0;
    while i < entries.len() {
        let (path, vfs_offset) = entries[i];
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if head.len() > usize::from(u8::MAX) {
            return Err(TvfsError::NameTooLong(head.to_string()));
        }

        if nested {
            out.push(0);
        }
        out.push(head.len() as u8);
        out.extend_from_slice(head.as_bytes());
        out.push(0xFF);

        if rest.is_none() {
            out.extend_from_slice(&vfs_offset.to_be_bytes());
            i += 1;
            continue;
        }

        // Gather every path under this folder
        let mut children = Vec::new();
        while i < entries.len() {
            let (path, offset) = entries[i];
            match path.split_once('/') {
                Some((h, r)) if h == head => children.push((r, offset)),
                _ => break,
            }
            i += 1;
        }

        let value_pos = out.len();
        out.extend_from_slice(&[0; 4]);
        build_level(&children, true, out)?;
        let folder_size = (out.len() - value_pos) as u32;
        out[value_pos..value_pos + 4]
            .copy_from_slice(&(TVFS_FOLDER_NODE | folder_size).to_be_bytes());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flat_files() {
        let mut data = Vec::new();
        data.extend_from_slice(&[5]);
        data.extend_from_slice(b"a.txt");
        data.extend_from_slice(&[0xFF, 0, 0, 0, 0]);
        data.extend_from_slice(&[5]);
        data.extend_from_slice(b"b.txt");
        data.extend_from_slice(&[0xFF, 0, 0, 0, 0x0D]);

        let files = parse_path_table(&data).expect("parse");
        assert_eq!(
            files,
            vec![
                PathFileEntry {
                    path: "a.txt".into(),
                    vfs_offset: 0
                },
                PathFileEntry {
                    path: "b.txt".into(),
                    vfs_offset: 13
                },
            ]
        );
    }

    #[test]
    fn test_implicit_separator_prefix() {
        // "dir" followed directly by a fragment joins with a separator
        let mut data = vec![3];
        data.extend_from_slice(b"dir");
        data.push(4);
        data.extend_from_slice(b"file");
        data.extend_from_slice(&[0xFF, 0, 0, 0, 7]);

        let files = parse_path_table(&data).expect("parse");
        assert_eq!(files[0].path, "dir/file");
        assert_eq!(files[0].vfs_offset, 7);
    }

    #[test]
    fn test_folders_round_trip() {
        let entries = [
            ("Data/Sub/x.bin", 10),
            ("Data/Sub/y.bin", 20),
            ("Data/z.bin", 30),
            ("readme.txt", 40),
        ];
        let mut data = Vec::new();
        build_level(&entries, false, &mut data).expect("build");

        let files = parse_path_table(&data).expect("parse");
        let parsed: Vec<(&str, u32)> = files
            .iter()
            .map(|f| (f.path.as_str(), f.vfs_offset))
            .collect();
        assert_eq!(parsed, entries.to_vec());
    }

    #[test]
    fn test_truncated_value() {
        let mut data = vec![1, b'a', 0xFF, 0];
        assert!(matches!(
            parse_path_table(&data),
            Err(TvfsError::PathTableTruncated(2))
        ));
        data = vec![1, b'a', 0xFF, 0x80, 0, 0, 0x40];
        assert!(matches!(
            parse_path_table(&data),
            Err(TvfsError::InvalidFolderSize { .. })
        ));
    }

    fn nested_folders(levels: usize) -> Vec<u8> {
        let leaf = [1, b'a', 0xFF, 0, 0, 0, 0];
        let mut data = Vec::with_capacity(levels * 5 + leaf.len());
        for level in 0..levels {
            let size = ((levels - level - 1) * 5 + leaf.len() + 4) as u32;
            data.push(0xFF);
            data.extend_from_slice(&(TVFS_FOLDER_NODE | size).to_be_bytes());
        }
        data.extend_from_slice(&leaf);
        data
    }

    #[test]
    fn test_nesting_within_limit() {
        let files = parse_path_table(&nested_folders(MAX_FOLDER_DEPTH)).expect("parse");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a");
    }

    #[test]
    fn test_rejects_deep_nesting() {
        assert!(matches!(
            parse_path_table(&nested_folders(MAX_FOLDER_DEPTH + 1)),
            Err(TvfsError::FolderTooDeep { .. })
        ));
        assert!(matches!(
            parse_path_table(&nested_folders(200_000)),
            Err(TvfsError::FolderTooDeep { limit: MAX_FOLDER_DEPTH, .. })
        ));
    }
}
