// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
///
/// Used by the executable pre-flight and by directory tree scans so both can
/// run against [`mock::MockFileSystem`] in tests.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// True for symbolic links (the link itself, not its target).
    fn is_symlink(&self, path: &Path) -> bool;

    fn file_len(&self, path: &Path) -> Result<u64>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Whether the calling user may execute `path`.
    fn is_executable(&self, path: &Path) -> bool;

    /// Add the owner execute bit (`S_IXUSR`) to `path`.
    fn set_user_executable(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path).with_context(|| format!("reading metadata of {:?}", path))?;
        Ok(meta.len())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    /// Checked with `access(2)` for the calling user, so a file executable
    /// only by group or others does not count when we own it.
    #[cfg(unix)]
    fn is_executable(&self, path: &Path) -> bool {
        use nix::unistd::{access, AccessFlags};

        path.is_file() && access(path, AccessFlags::X_OK).is_ok()
    }

    #[cfg(not(unix))]
    fn is_executable(&self, path: &Path) -> bool {
        path.is_file()
    }

    #[cfg(unix)]
    fn set_user_executable(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let meta = fs::metadata(path).with_context(|| format!("reading metadata of {:?}", path))?;
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o100);
        fs::set_permissions(path, perms)
            .with_context(|| format!("setting permissions on {:?}", path))
    }

    #[cfg(not(unix))]
    fn set_user_executable(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
