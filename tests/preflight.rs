use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};

use anyhow::Result;

use prochub::errors::ProchubError;
use prochub::exec::{ensure_executable, ProcessRegistry};
use prochub::fs::mock::MockFileSystem;
use prochub::fs::{FileSystem, RealFileSystem};
use prochub::types::LaunchOutcome;
use prochub_test_utils::builders::ConfigFileBuilder;
use prochub_test_utils::scripts::ScriptDir;
use prochub_test_utils::with_timeout;

type TestResult = std::result::Result<(), Box<dyn Error>>;

/// Mock filesystem whose `set_user_executable` parks until released.
#[derive(Debug)]
struct GatedFs {
    inner: MockFileSystem,
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl FileSystem for GatedFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }
    fn is_symlink(&self, path: &Path) -> bool {
        self.inner.is_symlink(path)
    }
    fn file_len(&self, path: &Path) -> Result<u64> {
        self.inner.file_len(path)
    }
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.inner.canonicalize(path)
    }
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
    fn is_executable(&self, path: &Path) -> bool {
        self.inner.is_executable(path)
    }
    fn set_user_executable(&self, path: &Path) -> Result<()> {
        self.entered.wait();
        self.release.wait();
        self.inner.set_user_executable(path)
    }
}

#[test]
fn executable_file_is_left_alone() {
    let fs = MockFileSystem::new();
    fs.add_executable("/bin/tool", b"#!/bin/sh\n");

    ensure_executable(&fs, Path::new("/bin/tool"), true).unwrap();
    assert_eq!(fs.mode("/bin/tool"), Some(0o755));
}

#[test]
fn missing_execute_bit_is_added() {
    let fs = MockFileSystem::new();
    fs.add_file("/work/run.sh", b"#!/bin/sh\n");

    ensure_executable(&fs, Path::new("/work/run.sh"), true).unwrap();
    assert_eq!(fs.mode("/work/run.sh"), Some(0o744));
    assert!(fs.is_executable(Path::new("/work/run.sh")));
}

#[test]
fn group_or_other_execute_bit_alone_is_not_enough() {
    let fs = MockFileSystem::new();
    fs.add_file_with_mode("/work/shared.sh", b"#!/bin/sh\n", 0o654);
    assert!(!fs.is_executable(Path::new("/work/shared.sh")));

    ensure_executable(&fs, Path::new("/work/shared.sh"), true).unwrap();
    assert_eq!(fs.mode("/work/shared.sh"), Some(0o754));
}

#[test]
fn missing_execute_bit_is_an_error_when_fixing_is_disabled() {
    let fs = MockFileSystem::new();
    fs.add_file("/work/run.sh", b"#!/bin/sh\n");

    let err = ensure_executable(&fs, Path::new("/work/run.sh"), false).unwrap_err();
    assert!(matches!(err, ProchubError::PermissionError { .. }));
    assert_eq!(fs.mode("/work/run.sh"), Some(0o644));
}

#[test]
fn failure_to_change_mode_is_a_permission_error() {
    let fs = MockFileSystem::new();
    fs.add_file("/work/foreign.sh", b"#!/bin/sh\n");
    fs.lock_permissions("/work/foreign.sh");

    let err = ensure_executable(&fs, Path::new("/work/foreign.sh"), true).unwrap_err();
    match err {
        ProchubError::PermissionError { binary, reason } => {
            assert_eq!(binary, "/work/foreign.sh");
            assert!(reason.contains("not permitted"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn paths_that_are_not_files_are_left_to_spawn() {
    let fs = MockFileSystem::new();
    fs.add_dir("/work/dir");

    ensure_executable(&fs, Path::new("sh"), false).unwrap();
    ensure_executable(&fs, Path::new("/work/missing"), false).unwrap();
    ensure_executable(&fs, Path::new("/work/dir"), false).unwrap();
}

#[tokio::test]
async fn registry_refuses_launch_when_preflight_fails() {
    let fs = MockFileSystem::new();
    fs.add_file("/work/foreign.sh", b"#!/bin/sh\n");
    fs.lock_permissions("/work/foreign.sh");

    let registry =
        ProcessRegistry::with_fs(ConfigFileBuilder::new().process_settings(), Arc::new(fs));

    let result = registry.launch("job", "/work/foreign.sh", vec![vec![]]);
    assert!(matches!(result, Err(ProchubError::PermissionError { .. })));
    assert!(registry.get("job").is_none());
    assert!(registry.is_empty());
}

#[cfg(unix)]
#[test]
fn real_file_gets_user_execute_bit() {
    use std::os::unix::fs::PermissionsExt;

    let scripts = ScriptDir::new().unwrap();
    let script = scripts.non_executable("plain.sh", "true").unwrap();
    let fs = RealFileSystem;
    assert!(!fs.is_executable(&script));

    ensure_executable(&fs, &script, true).unwrap();

    let mode = std::fs::metadata(&script).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o744);
    assert!(fs.is_executable(&script));
}

#[cfg(unix)]
#[test]
fn script_without_owner_execute_bit_runs_after_preflight() {
    let scripts = ScriptDir::new().unwrap();
    let script = scripts.with_mode("shared.sh", "exit 0", 0o654).unwrap();

    ensure_executable(&RealFileSystem, &script, true).unwrap();

    let status = std::process::Command::new(&script).status().unwrap();
    assert!(status.success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queries_do_not_wait_for_a_slow_preflight() -> TestResult {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let fs = GatedFs {
        inner: MockFileSystem::new(),
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    fs.inner.add_file("/work/slow.sh", b"#!/bin/sh\n");
    fs.inner.add_executable("/work/ready.sh", b"#!/bin/sh\n");

    let registry =
        ProcessRegistry::with_fs(ConfigFileBuilder::new().process_settings(), Arc::new(fs));

    let launcher = {
        let registry = registry.clone();
        tokio::task::spawn_blocking(move || registry.launch("slow", "/work/slow.sh", vec![vec![]]))
    };

    // The launch is now parked inside the pre-flight chmod.
    with_timeout(tokio::task::spawn_blocking(move || {
        entered.wait();
    }))
    .await?;

    let queries = {
        let registry = registry.clone();
        tokio::task::spawn_blocking(move || {
            let listed = registry.list().len();
            let killed = registry.kill("slow");
            let other = registry.launch("other", "/work/ready.sh", vec![vec![]]);
            (listed, killed, other)
        })
    };
    let (listed, killed, other) = with_timeout(queries).await?;
    assert_eq!(listed, 0);
    assert!(!killed);
    assert_eq!(other?, LaunchOutcome::Accepted);

    with_timeout(tokio::task::spawn_blocking(move || {
        release.wait();
    }))
    .await?;

    let outcome = with_timeout(launcher).await??;
    assert_eq!(outcome, LaunchOutcome::Accepted);
    assert!(registry.get("slow").is_some());
    Ok(())
}
