//! Directory traversal shared by enumeration and purge

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub path: PathBuf,
    pub kind: NodeKind,
}

/// Lazily walk everything below `root`, children before their directory.
///
/// The root itself is not yielded. A missing root yields nothing.
pub fn walk(root: &Path) -> impl Iterator<Item = io::Result<TreeNode>> {
    let missing = !root.exists();
    WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter(move |_| !missing)
        .filter_map(|item| match item {
            Ok(entry) => {
                let kind = if entry.file_type().is_dir() {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                };
                Some(Ok(TreeNode {
                    path: entry.into_path(),
                    kind,
                }))
            }
            // Vanished mid-walk, e.g. a concurrent commit renamed it away
            Err(err)
                if err
                    .io_error()
                    .map(|e| e.kind() == io::ErrorKind::NotFound)
                    .unwrap_or(false) =>
            {
                None
            }
            Err(err) => Some(Err(err.into())),
        })
}

/// Delete everything inside `root`, keeping `root`
pub fn delete_contents(root: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    let mut first_error = None;
    for entry in entries {
        let entry = entry?;
        let result = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())
        } else {
            fs::remove_file(entry.path())
        };
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Delete `root` and everything below it
pub fn delete_recursively(root: &Path) -> io::Result<()> {
    match fs::remove_dir_all(root) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_walk_yields_children_before_parents() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("a").join("b");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("f.txt"), b"x").unwrap();
        fs::write(dir.path().join("top.txt"), b"y").unwrap();

        let nodes: Vec<TreeNode> = walk(dir.path()).map(|n| n.unwrap()).collect();
        assert_eq!(nodes.len(), 4);
        assert!(nodes.iter().all(|n| n.path != dir.path()));

        let pos = |p: &Path| nodes.iter().position(|n| n.path == p).unwrap();
        assert!(pos(&sub.join("f.txt")) < pos(&sub));
        assert!(pos(&sub) < pos(&dir.path().join("a")));
        assert_eq!(nodes[pos(&sub)].kind, NodeKind::Directory);
        assert_eq!(nodes[pos(&sub.join("f.txt"))].kind, NodeKind::File);
    }

    #[test]
    fn test_walk_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(walk(&dir.path().join("nope")).count(), 0);
    }

    #[test]
    fn test_delete_contents_keeps_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        fs::write(dir.path().join("x/y/z"), b"1").unwrap();
        fs::write(dir.path().join("loose"), b"2").unwrap();

        delete_contents(dir.path()).unwrap();
        assert!(dir.path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_recursively_tolerates_missing() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("inner")).unwrap();
        delete_recursively(&root).unwrap();
        assert!(!root.exists());
        delete_recursively(&root).unwrap();
    }
}
