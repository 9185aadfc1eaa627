// src/exec/preflight.rs

//! Executable-bit check performed before a launch is admitted.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::{ProchubError, Result};
use crate::fs::FileSystem;

/// Make sure `binary` can be executed.
///
/// - A path that is not an existing file (e.g. a bare name resolved through
///   `PATH`, or a missing file) is left to the spawn itself, which reports an
///   execution error in the background.
/// - An existing file the calling user cannot execute gets `S_IXUSR` added when `fix`
///   is set; otherwise, or if that fails, a permission error is returned.
pub fn ensure_executable(fs: &dyn FileSystem, binary: &Path, fix: bool) -> Result<()> {
    if !fs.is_file(binary) {
        debug!(binary = ?binary, "binary is not a local file; skipping pre-flight");
        return Ok(());
    }

    if fs.is_executable(binary) {
        return Ok(());
    }

    let shown = binary.display().to_string();

    if !fix {
        return Err(ProchubError::PermissionError {
            binary: shown,
            reason: "file is not executable".to_string(),
        });
    }

    fs.set_user_executable(binary)
        .map_err(|err| ProchubError::PermissionError {
            binary: shown.clone(),
            reason: format!("{err:#}"),
        })?;

    if !fs.is_executable(binary) {
        return Err(ProchubError::PermissionError {
            binary: shown,
            reason: "execute permission did not take effect".to_string(),
        });
    }

    info!(binary = %shown, "added user execute permission");
    Ok(())
}
