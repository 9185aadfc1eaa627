use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Temporary directory of throwaway shell scripts.
///
/// Removed when dropped.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("creating script dir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `#!/bin/sh` + `body` to `name` with mode `0o755`.
    pub fn executable(&self, name: &str, body: &str) -> Result<PathBuf> {
        self.write(name, body, 0o755)
    }

    /// Same as [`executable`](Self::executable) but with mode `0o644`.
    pub fn non_executable(&self, name: &str, body: &str) -> Result<PathBuf> {
        self.write(name, body, 0o644)
    }

    /// Script with an arbitrary `mode`, e.g. `0o654` (group/other execute only).
    pub fn with_mode(&self, name: &str, body: &str, mode: u32) -> Result<PathBuf> {
        self.write(name, body, mode)
    }

    fn write(&self, name: &str, body: &str, mode: u32) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))
            .with_context(|| format!("writing script {:?}", path))?;
        set_mode(&path, mode)?;
        Ok(path)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode on {:?}", path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
