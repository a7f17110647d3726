use std::error::Error;
use std::path::PathBuf;

use super::SyncError;
use crate::locks::LockError;
use crate::snapshot;

#[test]
fn sync_error_classifiers_detect_expected_git_failures() {
    let missing_remote = SyncError::GitCommandFailed {
        command: "git fetch origin".to_string(),
        code: Some(128),
        stderr: "fatal: 'origin' does not appear to be a git repository".to_string(),
    };
    assert!(missing_remote.is_missing_remote());
    assert!(!missing_remote.is_non_fast_forward());

    let non_fast_forward = SyncError::GitCommandFailed {
        command: "git push".to_string(),
        code: Some(1),
        stderr: "! [rejected] HEAD -> skein (fetch first)".to_string(),
    };
    assert!(!non_fast_forward.is_missing_remote());
    assert!(non_fast_forward.is_non_fast_forward());

    let rejected = SyncError::PushRejected {
        remote: "origin".to_string(),
        dest_ref: "refs/heads/skein".to_string(),
        stderr: "non-fast-forward".to_string(),
    };
    assert!(rejected.is_non_fast_forward());
    assert_eq!(rejected.stderr(), Some("non-fast-forward"));
    assert_eq!(SyncError::GitUnavailable.stderr(), None);
}

#[test]
fn sync_error_display_source_and_from_cover_variants() {
    let io: SyncError = std::io::Error::other("disk").into();
    assert!(io.to_string().contains("I/O error"));
    assert!(io.source().is_some());

    let db: SyncError = rusqlite::Error::InvalidQuery.into();
    assert!(db.to_string().contains("database error"));
    assert!(db.source().is_some());

    let unavailable = SyncError::GitUnavailable;
    assert!(unavailable.to_string().contains("git CLI is not installed"));
    assert!(unavailable.source().is_none());

    let command_failed = SyncError::GitCommandFailed {
        command: "git fetch".to_string(),
        code: Some(1),
        stderr: "bad".to_string(),
    };
    assert!(command_failed.to_string().contains("git command failed"));

    let not_repo = SyncError::NotARepository(PathBuf::from("/tmp/plain"));
    assert!(not_repo.to_string().contains("not inside a git repository"));

    let missing = SyncError::RemoteRefMissing {
        remote: "origin".to_string(),
        remote_ref: "refs/heads/skein".to_string(),
    };
    assert!(missing.to_string().contains("has no ref 'refs/heads/skein'"));

    let fetch_failed = SyncError::RemoteFetchFailed {
        remote: "origin".to_string(),
        remote_ref: "refs/heads/skein".to_string(),
        stderr: "pack corrupt".to_string(),
    };
    assert!(fetch_failed.to_string().contains("although it exists"));

    let setup = SyncError::WorktreeSetup {
        path: PathBuf::from("/tmp/wt"),
        message: "no commits".to_string(),
    };
    assert!(setup.to_string().contains("failed to prepare sync worktree"));

    let codec_err = snapshot::decode(b"{not json}\n").unwrap_err();
    let malformed = SyncError::MalformedSnapshot {
        origin: "refs/remotes/origin/skein:.skein/snapshot.jsonl".to_string(),
        source: codec_err,
    };
    assert!(malformed.to_string().contains("is malformed"));
    assert!(malformed.source().is_some());

    let lock: SyncError = LockError::Busy(PathBuf::from("/tmp/x.lock")).into();
    assert!(lock.to_string().contains("lock busy"));

    let invalid = SyncError::InvalidTarget("branch ''".to_string());
    assert!(invalid.to_string().starts_with("invalid sync target"));
}
