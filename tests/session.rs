//! Session bootstrap and publish against local fixtures: an in-memory
//! snapshot source and a bare git repository acting as the remote.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use mouse_records_manager::error::SyncError;
use mouse_records_manager::session::{bootstrap, publish, PublishOutcome, SnapshotSource};
use mouse_records_manager::{Collection, Record, RecordStore, StoreConfig, SyncConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const LIVE_URL: &str = "https://snapshots.test/live.csv";
const DECEASED_URL: &str = "https://snapshots.test/deceased.csv";

/// Serves canned bodies by URL; anything else fails like a broken download.
struct FixedSource {
    bodies: HashMap<&'static str, &'static str>,
}

impl SnapshotSource for FixedSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        self.bodies
            .get(url)
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| SyncError::Body {
                url: url.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "unreachable"),
            })
    }
}

fn test_env() -> (TempDir, RecordStore, SyncConfig) {
    let temp_dir = TempDir::new().unwrap();
    let store = RecordStore::open(StoreConfig::at(temp_dir.path().join("mice.sqlite"))).unwrap();
    let sync = SyncConfig {
        live_url: LIVE_URL.to_string(),
        deceased_url: DECEASED_URL.to_string(),
        repo_dir: temp_dir.path().join("checkout"),
        token_env: "MOUSE_RECORDS_TEST_TOKEN_NOT_SET".to_string(),
        username_env: "MOUSE_RECORDS_TEST_USERNAME_NOT_SET".to_string(),
        ..SyncConfig::default()
    };
    (temp_dir, store, sync)
}

#[test]
fn bootstrap_loads_both_snapshots() {
    let (_dir, store, sync) = test_env();
    let source = FixedSource {
        bodies: HashMap::from([
            (LIVE_URL, "INDEX_ID,id,cage_number,mouseline\n1,M001,12,C57\n2,M002,13,C57\n"),
            (DECEASED_URL, "INDEX_ID,id,cage_number,mouseline\n1,D001,2,BALB\n"),
        ]),
    };

    let report = bootstrap(&store, &sync, &source);

    assert!(report.all_loaded());
    assert_eq!(store.count(Collection::Live).unwrap(), 2);
    assert_eq!(store.count(Collection::Deceased).unwrap(), 1);
    assert!(sync.file_path(Collection::Live).exists());
    assert_eq!(
        report.summary_lines(),
        vec![
            "Live Mice: loaded 2 records from snapshot".to_string(),
            "Deceased Mice: loaded 1 records from snapshot".to_string(),
        ]
    );
}

#[test]
fn failed_snapshot_keeps_local_records() {
    let (_dir, store, sync) = test_env();
    store
        .insert(Collection::Deceased, &Record::new("LOCAL"))
        .unwrap();
    let source = FixedSource {
        bodies: HashMap::from([(LIVE_URL, "identifier,mouseline\nM001,C57\n")]),
    };

    let report = bootstrap(&store, &sync, &source);

    assert!(!report.all_loaded());
    assert_eq!(store.count(Collection::Live).unwrap(), 1);
    let deceased = store.fetch(Collection::Deceased).unwrap();
    assert_eq!(deceased, vec![Record::new("LOCAL")]);

    let lines = report.summary_lines();
    assert!(lines[1].contains("kept local records"));
    assert!(lines[1].contains("unreachable"));
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A bare remote plus an initialized checkout wired into `sync`.
fn init_repos(root: &Path, sync: &mut SyncConfig) {
    sync.remote_url = bare_remote(root);
    fs::create_dir_all(&sync.repo_dir).unwrap();
    git(&sync.repo_dir, &["init", "--quiet"]);
}

#[test]
fn publish_commits_and_pushes_exports() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    init_repos(dir.path(), &mut sync);
    store.insert(Collection::Live, &Record::new("M001")).unwrap();

    let report = publish(&store, &sync).unwrap();

    assert!(matches!(report.outcome, PublishOutcome::Pushed));
    assert_eq!(
        report.exported,
        vec![(Collection::Live, 1), (Collection::Deceased, 0)]
    );
    let remote = dir.path().join("remote.git");
    let log = git(&remote, &["log", "--all", "--format=%s"]);
    assert_eq!(log.trim(), sync.commit_message);

    let exported = fs::read_to_string(sync.file_path(Collection::Live)).unwrap();
    assert!(exported.lines().nth(1).unwrap().starts_with("M001,"));
}

#[test]
fn publish_without_changes_makes_no_commit() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    init_repos(dir.path(), &mut sync);
    store.insert(Collection::Live, &Record::new("M001")).unwrap();

    publish(&store, &sync).unwrap();
    let report = publish(&store, &sync).unwrap();

    assert!(matches!(report.outcome, PublishOutcome::NothingToPublish));
    let log = git(&sync.repo_dir, &["log", "--format=%s"]);
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn failed_push_keeps_local_commit() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    init_repos(dir.path(), &mut sync);
    sync.remote_url = dir.path().join("missing.git").display().to_string();
    store
        .insert(Collection::Deceased, &Record::new("D001"))
        .unwrap();

    let report = publish(&store, &sync).unwrap();

    assert!(matches!(
        report.outcome,
        PublishOutcome::CommittedNotPushed(SyncError::Git { .. })
    ));
    assert!(report.summary().contains("push failed"));
    let log = git(&sync.repo_dir, &["log", "--format=%s"]);
    assert_eq!(log.trim(), sync.commit_message);
}

fn bare_remote(root: &Path) -> String {
    let remote = root.join("remote.git");
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare", "--quiet"]);
    remote.display().to_string()
}

#[test]
fn publish_without_remote_is_refused() {
    let (_dir, store, sync) = test_env();
    assert!(sync.remote_url.is_empty());

    let result = publish(&store, &sync);

    assert!(matches!(result, Err(SyncError::NoRemote)));
    assert!(!sync.file_path(Collection::Live).exists());
}

#[test]
fn publish_initializes_a_fresh_directory() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    sync.remote_url = bare_remote(dir.path());
    store.insert(Collection::Live, &Record::new("M001")).unwrap();

    let report = publish(&store, &sync).unwrap();

    assert!(matches!(report.outcome, PublishOutcome::Pushed));
    assert!(sync.repo_dir.join(".git").exists());
    let log = git(&dir.path().join("remote.git"), &["log", "--all", "--format=%s"]);
    assert_eq!(log.trim(), sync.commit_message);
}

#[test]
fn fresh_checkout_builds_on_remote_history() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    sync.remote_url = bare_remote(dir.path());
    store.insert(Collection::Live, &Record::new("M001")).unwrap();
    publish(&store, &sync).unwrap();

    // A second machine with its own empty checkout directory.
    let mut other_sync = sync.clone();
    other_sync.repo_dir = dir.path().join("second-checkout");
    store.insert(Collection::Live, &Record::new("M002")).unwrap();

    let report = publish(&store, &other_sync).unwrap();

    assert!(matches!(report.outcome, PublishOutcome::Pushed));
    let log = git(&dir.path().join("remote.git"), &["log", "--all", "--format=%s"]);
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn checkout_nested_in_another_repository_gets_its_own() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let (dir, store, mut sync) = test_env();
    sync.remote_url = bare_remote(dir.path());
    let outer = dir.path().join("outer");
    fs::create_dir_all(&outer).unwrap();
    git(&outer, &["init", "--quiet"]);
    sync.repo_dir = outer.join("sync");
    store.insert(Collection::Live, &Record::new("M001")).unwrap();

    let report = publish(&store, &sync).unwrap();

    assert!(matches!(report.outcome, PublishOutcome::Pushed));
    assert!(sync.repo_dir.join(".git").exists());
    let outer_commits = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", "HEAD"])
        .current_dir(&outer)
        .output()
        .unwrap();
    assert!(!outer_commits.status.success());
}
