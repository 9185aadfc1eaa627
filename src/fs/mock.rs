// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, mode: u32 },
    Dir(Vec<String>), // List of child names
    Symlink(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    /// Paths whose permissions cannot be changed.
    locked: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            locked: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Add a regular, non-executable file (mode `0o644`).
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_entry(
            path.as_ref(),
            MockEntry::File {
                content: content.into(),
                mode: 0o644,
            },
        );
    }

    /// Add a file with mode `0o755`.
    pub fn add_executable(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_entry(
            path.as_ref(),
            MockEntry::File {
                content: content.into(),
                mode: 0o755,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.entries();
        self.ensure_dir_entry(&mut files, path.as_ref());
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert_entry(path.as_ref(), MockEntry::Symlink(target.into()));
    }

    /// Make `set_user_executable` fail for `path`, as for a file owned by
    /// another user.
    pub fn lock_permissions(&self, path: impl AsRef<Path>) {
        self.locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf());
    }

    /// Add a regular file with an explicit mode.
    pub fn add_file_with_mode(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>, mode: u32) {
        self.insert_entry(
            path.as_ref(),
            MockEntry::File {
                content: content.into(),
                mode,
            },
        );
    }

    /// Current mode of a file entry, if any.
    pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        match self.entries().get(path.as_ref()) {
            Some(MockEntry::File { mode, .. }) => Some(*mode),
            _ => None,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_entry(&self, path: &Path, entry: MockEntry) {
        let mut files = self.entries();
        files.insert(path.to_path_buf(), entry);

        // Ensure parent directories exist implicitly for simplicity in this mock
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };

            self.ensure_dir_entry(&mut files, parent);
            link_child(&mut files, parent, path);
        }
    }

    fn ensure_dir_entry(&self, files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };

            if parent != path {
                // Avoid infinite loop at root
                self.ensure_dir_entry(files, parent);
                link_child(files, parent, path);
            }
        }
    }
}

fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir(_)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Symlink(_)))
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        match self.entries().get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.len() as u64),
            Some(_) => Err(anyhow!("Not a file: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        Ok(path.to_path_buf())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.entries().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    /// The caller is taken to own every mock file, so only the owner bit counts.
    fn is_executable(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::File { mode, .. }) if mode & 0o100 != 0)
    }

    fn set_user_executable(&self, path: &Path) -> Result<()> {
        if self
            .locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
        {
            return Err(anyhow!("Operation not permitted: {:?}", path));
        }

        match self.entries().get_mut(path) {
            Some(MockEntry::File { mode, .. }) => {
                *mode |= 0o100;
                Ok(())
            }
            Some(_) => Err(anyhow!("Not a file: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
