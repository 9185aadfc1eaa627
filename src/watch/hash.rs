// src/watch/hash.rs

use blake3::Hasher;

use crate::watch::tree::{DirNode, NodeKind};

/// Deterministic hash of a tree's shape: paths, kinds and file sizes.
///
/// File contents are not read, so an edit that keeps the size unchanged
/// produces the same fingerprint.
pub fn tree_fingerprint(tree: &DirNode) -> String {
    let mut hasher = Hasher::new();
    feed(&mut hasher, tree);
    hasher.finalize().to_hex().to_string()
}

fn feed(hasher: &mut Hasher, node: &DirNode) {
    let tag: &[u8] = match node.kind {
        NodeKind::File => b"f",
        NodeKind::Directory => b"d",
        NodeKind::Symlink => b"l",
    };
    hasher.update(tag);
    hasher.update(node.path.as_bytes());
    hasher.update(&[0]);
    hasher.update(&node.size.unwrap_or(0).to_le_bytes());

    // Children are already sorted by the scanner.
    for child in &node.children {
        feed(hasher, child);
    }
    hasher.update(b"/");
}
