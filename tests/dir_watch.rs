mod common;
use crate::common::init_tracing;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use prochub::fs::mock::MockFileSystem;
use prochub::watch::{
    scan_tree, tree_fingerprint, DirNode, DirUpdate, DirWatchRegistry, ExcludeMatcher, NodeKind,
    WatchSettings,
};
use prochub_test_utils::builders::ConfigFileBuilder;

fn project_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/main.rs", b"fn main() {}");
    fs.add_file("/proj/src/lib.rs", b"");
    fs.add_file("/proj/README.md", b"# readme");
    fs.add_file("/proj/target/debug/app", b"binary");
    fs
}

fn exclude(patterns: &[&str]) -> ExcludeMatcher {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    ExcludeMatcher::new(&patterns).unwrap()
}

fn fast_watch_settings(excluded: &[&str]) -> WatchSettings {
    let mut builder = ConfigFileBuilder::new().debounce_ms(20);
    for pattern in excluded {
        builder = builder.exclude(pattern);
    }
    builder.watch_settings()
}

/// Receive updates until one satisfies `pred`.
async fn next_matching<F>(rx: &mut mpsc::Receiver<DirUpdate>, mut pred: F) -> DirUpdate
where
    F: FnMut(&DirNode) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let update = rx.recv().await.expect("watch channel closed");
            if pred(&update.tree) {
                return update;
            }
        }
    })
    .await
    .expect("no matching directory update within 5 seconds")
}

#[test]
fn scan_builds_sorted_tree() {
    let fs = project_fs();
    let tree = scan_tree(&fs, Path::new("/proj"), &ExcludeMatcher::default()).unwrap();

    assert_eq!(tree.kind, NodeKind::Directory);
    assert_eq!(tree.name, "proj");
    let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["README.md", "src", "target"]);

    let main = tree.find("src/main.rs").expect("main.rs in tree");
    assert_eq!(main.kind, NodeKind::File);
    assert_eq!(main.size, Some(12));
    assert_eq!(main.path, "/proj/src/main.rs");

    assert!(tree.find("target/debug/app").is_some());
    assert_eq!(tree.count(), 8);
}

#[test]
fn excluded_entries_are_left_out() {
    let fs = project_fs();
    let tree = scan_tree(&fs, Path::new("/proj"), &exclude(&["target", "**/*.md"])).unwrap();

    assert!(tree.find("target").is_none());
    assert!(tree.find("README.md").is_none());
    assert!(tree.find("src/lib.rs").is_some());
}

#[test]
fn symlinks_are_not_followed() {
    let fs = project_fs();
    fs.add_symlink("/proj/loop", "/proj");

    let tree = scan_tree(&fs, Path::new("/proj"), &ExcludeMatcher::default()).unwrap();
    let link = tree.find("loop").expect("symlink listed");
    assert_eq!(link.kind, NodeKind::Symlink);
    assert!(link.children.is_empty());
}

#[test]
fn scanning_a_file_or_missing_path_fails() {
    let fs = project_fs();
    let matcher = ExcludeMatcher::default();

    assert!(scan_tree(&fs, Path::new("/proj/README.md"), &matcher).is_err());
    assert!(scan_tree(&fs, Path::new("/nowhere"), &matcher).is_err());
}

#[test]
fn fingerprint_tracks_tree_shape() {
    let fs = project_fs();
    let matcher = ExcludeMatcher::default();

    let a = tree_fingerprint(&scan_tree(&fs, Path::new("/proj"), &matcher).unwrap());
    let b = tree_fingerprint(&scan_tree(&fs, Path::new("/proj"), &matcher).unwrap());
    assert_eq!(a, b);

    fs.add_file("/proj/src/new.rs", b"");
    let c = tree_fingerprint(&scan_tree(&fs, Path::new("/proj"), &matcher).unwrap());
    assert_ne!(a, c);
}

#[tokio::test]
async fn watching_a_missing_directory_fails_quietly() {
    let registry =
        DirWatchRegistry::with_fs(WatchSettings::default(), Arc::new(MockFileSystem::new()));
    let (tx, _rx) = mpsc::channel(8);

    assert!(!registry.watch("/does/not/exist", tx));
    assert!(!registry.is_watching(Path::new("/does/not/exist")));
}

#[tokio::test]
async fn change_in_watched_directory_pushes_snapshot() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("existing.txt"), b"hi").unwrap();

    let registry = DirWatchRegistry::new(fast_watch_settings(&[]));
    let (tx, mut rx) = mpsc::channel(8);
    assert!(registry.watch(dir.path(), tx));
    assert!(registry.is_watching(dir.path()));

    fs::write(dir.path().join("new.txt"), b"fresh").unwrap();

    let update = next_matching(&mut rx, |tree| tree.find("new.txt").is_some()).await;
    assert_eq!(update.path, dir.path());
    assert!(update.tree.find("existing.txt").is_some());

    registry.clear_all();
}

#[tokio::test]
async fn excluded_paths_stay_out_of_snapshots() {
    let dir = tempfile::tempdir().unwrap();

    let registry = DirWatchRegistry::new(fast_watch_settings(&["ignored", "ignored/**"]));
    let (tx, mut rx) = mpsc::channel(8);
    assert!(registry.watch(dir.path(), tx));

    fs::create_dir(dir.path().join("ignored")).unwrap();
    fs::write(dir.path().join("ignored/noise.log"), b"x").unwrap();
    fs::write(dir.path().join("kept.txt"), b"y").unwrap();

    let update = next_matching(&mut rx, |tree| tree.find("kept.txt").is_some()).await;
    assert!(update.tree.find("ignored").is_none());

    registry.clear_all();
}

#[tokio::test]
async fn clear_stops_the_watch() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DirWatchRegistry::new(fast_watch_settings(&[]));
    let (tx, mut rx) = mpsc::channel(8);

    assert!(registry.watch(dir.path(), tx));
    assert!(registry.clear(dir.path()));
    assert!(!registry.is_watching(dir.path()));
    assert!(!registry.clear(dir.path()));

    // Dropping the watch ends the rescan loop, which drops the only sender.
    let closed = timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn clearing_mid_burst_drops_the_pending_update() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DirWatchRegistry::new(ConfigFileBuilder::new().debounce_ms(400).watch_settings());
    let (tx, mut rx) = mpsc::channel(8);

    assert!(registry.watch(dir.path(), tx));
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(registry.clear(dir.path()));

    // Either the channel closes or nothing shows up; an update must not.
    let next = timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(!matches!(next, Ok(Some(_))), "update arrived after clear");
}

#[tokio::test]
async fn replaced_watch_goes_quiet_mid_burst() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DirWatchRegistry::new(ConfigFileBuilder::new().debounce_ms(400).watch_settings());

    let (first_tx, mut first_rx) = mpsc::channel(8);
    let (second_tx, _second_rx) = mpsc::channel(8);
    assert!(registry.watch(dir.path(), first_tx));
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(registry.watch(dir.path(), second_tx));

    let next = timeout(Duration::from_secs(1), first_rx.recv()).await;
    assert!(!matches!(next, Ok(Some(_))), "replaced watch still pushed");
}

#[tokio::test]
async fn watching_twice_replaces_the_previous_watch() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DirWatchRegistry::new(fast_watch_settings(&[]));

    let (first_tx, _first_rx) = mpsc::channel(8);
    let (second_tx, mut second_rx) = mpsc::channel(8);
    assert!(registry.watch(dir.path(), first_tx));
    assert!(registry.watch(dir.path(), second_tx));
    assert_eq!(registry.watched_paths(), vec![dir.path().to_path_buf()]);

    fs::write(dir.path().join("after.txt"), b"z").unwrap();
    next_matching(&mut second_rx, |tree| tree.find("after.txt").is_some()).await;

    registry.clear_all();
    assert!(registry.watched_paths().is_empty());
}
