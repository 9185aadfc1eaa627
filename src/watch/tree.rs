// src/watch/tree.rs

//! Recursive directory enumeration into a serializable tree.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::warn;

use crate::fs::FileSystem;
use crate::watch::patterns::ExcludeMatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    File,
    Directory,
    /// Not followed, so link cycles cannot recurse forever.
    Symlink,
}

/// One entry of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirNode {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Sorted by name. Always empty for files and symlinks.
    pub children: Vec<DirNode>,
}

impl DirNode {
    /// Look up a descendant by a forward-slash path relative to this node.
    pub fn find(&self, rel: &str) -> Option<&DirNode> {
        rel.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self, |node, part| node.children.iter().find(|c| c.name == part))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DirNode::count).sum::<usize>()
    }
}

/// Enumerate `root` recursively.
///
/// Entries whose root-relative path matches `exclude` are left out (along
/// with everything below them). A subdirectory that cannot be read, e.g.
/// because it was removed mid-scan, is kept with no children.
pub fn scan_tree(fs: &dyn FileSystem, root: &Path, exclude: &ExcludeMatcher) -> Result<DirNode> {
    if !fs.is_dir(root) {
        bail!("not a directory: {:?}", root);
    }

    let children = scan_dir(fs, root, root, exclude)?;
    Ok(DirNode {
        name: node_name(root),
        path: root.to_string_lossy().into_owned(),
        kind: NodeKind::Directory,
        size: None,
        children,
    })
}

fn scan_dir(
    fs: &dyn FileSystem,
    root: &Path,
    dir: &Path,
    exclude: &ExcludeMatcher,
) -> Result<Vec<DirNode>> {
    let mut nodes = Vec::new();

    for path in fs.read_dir(dir)? {
        let rel = path
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if exclude.matches_relative(&rel) {
            continue;
        }

        let node = if fs.is_symlink(&path) {
            leaf(&path, NodeKind::Symlink, None)
        } else if fs.is_dir(&path) {
            let children = match scan_dir(fs, root, &path, exclude) {
                Ok(children) => children,
                Err(err) => {
                    warn!(path = ?path, error = %format!("{err:#}"), "could not read directory");
                    Vec::new()
                }
            };
            DirNode {
                children,
                ..leaf(&path, NodeKind::Directory, None)
            }
        } else {
            leaf(&path, NodeKind::File, fs.file_len(&path).ok())
        };

        nodes.push(node);
    }

    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(nodes)
}

fn leaf(path: &Path, kind: NodeKind, size: Option<u64>) -> DirNode {
    DirNode {
        name: node_name(path),
        path: path.to_string_lossy().into_owned(),
        kind,
        size,
        children: Vec::new(),
    }
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
