// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled `[watch].exclude` patterns.
///
/// Patterns are matched against paths relative to the watched root, with
/// forward slashes (e.g. `"node_modules/pkg/index.js"`).
#[derive(Clone, Default)]
pub struct ExcludeMatcher {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for ExcludeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcludeMatcher")
            .field("patterns", &self.patterns)
            .finish()
    }
}

impl ExcludeMatcher {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let set = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns).context("building exclude globset")?)
        };
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_none()
    }

    /// Match a root-relative, forward-slash path.
    pub fn matches_relative(&self, rel: &str) -> bool {
        match &self.set {
            Some(set) => !rel.is_empty() && set.is_match(rel),
            None => false,
        }
    }

    /// Match an absolute path under `root`. Paths outside `root` never match.
    pub fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        if self.set.is_none() {
            return false;
        }
        relative_str(root, path)
            .map(|rel| self.matches_relative(&rel))
            .unwrap_or(false)
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `path` relative to `root` with forward slashes.
///
/// Falls back to comparing canonical paths, since notify may report a
/// different absolute prefix for the same directory (symlinked temp dirs on
/// macOS).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let (root_canon, path_canon) = (root.canonicalize().ok()?, path.canonicalize().ok()?);
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
