use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::db;
use crate::domain::WorkItem;
use crate::locks::LockError;
use crate::merge::{self, ConflictDetail};
use crate::snapshot::{self, CodecError, Snapshot, SnapshotFileSummary};

mod fetch;
mod git;
mod push;
mod target;
mod worktree;

pub use fetch::{RemoteFetcher, RemoteSnapshot};
pub use git::GitAdapter;
pub use push::{PushSummary, ReplicationTransport};
pub use target::SyncTarget;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub target: SyncTarget,
    /// Snapshot location relative to the repository root.
    pub snapshot_path: PathBuf,
    pub lock_timeout: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Fetched,
    Missing,
    Unavailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub local: u64,
    pub remote: u64,
    pub merged: u64,
    /// Rows written to the local store by this pass.
    pub imported: u64,
}

impl EntityCounts {
    fn new(local: usize, remote: usize, merged: usize) -> Self {
        Self {
            local: local as u64,
            remote: remote as u64,
            merged: merged as u64,
            imported: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncSummary {
    pub target: SyncTarget,
    pub remote_state: RemoteState,
    pub dry_run: bool,
    pub work_items: EntityCounts,
    pub comments: EntityCounts,
    pub dependencies: EntityCounts,
    pub conflicts: Vec<String>,
    pub conflict_details: Vec<ConflictDetail>,
    pub snapshot: Option<SnapshotFileSummary>,
    pub push: Option<PushSummary>,
}

pub struct SyncService<'a> {
    conn: &'a mut Connection,
    repo_root: PathBuf,
    git: GitAdapter,
    pause: ReplicationPause,
}

impl<'a> SyncService<'a> {
    pub fn new(conn: &'a mut Connection, repo_root: PathBuf) -> Self {
        Self {
            conn,
            repo_root,
            git: GitAdapter::new(),
            pause: ReplicationPause::default(),
        }
    }

    /// Shares the owner's pause handle so its replication hook stays quiet
    /// during the bulk import.
    pub fn with_pause(mut self, pause: ReplicationPause) -> Self {
        self.pause = pause;
        self
    }

    pub fn sync(&mut self, options: &SyncOptions) -> Result<SyncSummary, SyncError> {
        self.sync_at(options, OffsetDateTime::now_utc())
    }

    /// One reconciliation pass with an explicit merge clock.
    pub fn sync_at(
        &mut self,
        options: &SyncOptions,
        now: OffsetDateTime,
    ) -> Result<SyncSummary, SyncError> {
        let resolved = options.target.resolve()?;
        let repo_root = self.git.toplevel(&self.repo_root)?;
        info!(target = %options.target, dry_run = options.dry_run, "sync started");

        let local = Snapshot {
            items: db::list_work_items(self.conn)?,
            comments: db::list_comments(self.conn)?,
            dependencies: db::list_dependencies(self.conn)?,
        };

        let fetched =
            RemoteFetcher::new(&self.git, &repo_root).fetch(&resolved, &options.snapshot_path)?;
        let remote_state = match &fetched {
            RemoteSnapshot::Fetched { .. } => RemoteState::Fetched,
            RemoteSnapshot::Missing => RemoteState::Missing,
            RemoteSnapshot::Unavailable { .. } => RemoteState::Unavailable,
        };
        let remote = match fetched.blob() {
            Some(blob) => snapshot::decode(blob).map_err(|source| SyncError::MalformedSnapshot {
                origin: format!(
                    "{}:{}",
                    resolved.tracking_ref,
                    options.snapshot_path.display()
                ),
                source,
            })?,
            None => Snapshot::default(),
        };

        let items = merge::merge_work_items(&local.items, &remote.items, now);
        let comments = merge::merge_comments(&local.comments, &remote.comments);
        let dependencies = merge::merge_dependency_edges(&local.dependencies, &remote.dependencies);
        if !items.conflicts.is_empty() {
            info!(count = items.conflicts.len(), "resolved work item conflicts");
        }

        let mut summary = SyncSummary {
            target: options.target.clone(),
            remote_state,
            dry_run: options.dry_run,
            work_items: EntityCounts::new(local.items.len(), remote.items.len(), items.merged.len()),
            comments: EntityCounts::new(
                local.comments.len(),
                remote.comments.len(),
                comments.len(),
            ),
            dependencies: EntityCounts::new(
                local.dependencies.len(),
                remote.dependencies.len(),
                dependencies.len(),
            ),
            conflicts: items.conflicts,
            conflict_details: items.conflict_details,
            snapshot: None,
            push: None,
        };
        if options.dry_run {
            return Ok(summary);
        }

        let before: BTreeMap<&str, &WorkItem> = local
            .items
            .iter()
            .map(|item| (item.id.as_str(), item))
            .collect();
        let changed_items: Vec<WorkItem> = items
            .merged
            .iter()
            .filter(|merged| before.get(merged.id.as_str()) != Some(merged))
            .cloned()
            .collect();
        let conn = &mut *self.conn;
        let (import, comments_added) = with_auto_replication_paused(&self.pause, || {
            let counts = db::import_items_and_dependencies(conn, &changed_items, &dependencies)?;
            let comments_added = db::import_comments(conn, &comments)?;
            Ok::<_, rusqlite::Error>((counts, comments_added))
        })?;
        summary.work_items.imported = import.items;
        summary.dependencies.imported = import.dependencies_added;
        summary.comments.imported = comments_added;

        let merged = Snapshot {
            items: items.merged,
            comments,
            dependencies,
        };
        let written = snapshot::write_snapshot(&repo_root.join(&options.snapshot_path), &merged)
            .map_err(SyncError::Snapshot)?;
        summary.snapshot = Some(written);

        if remote_state == RemoteState::Unavailable {
            warn!(remote = %resolved.remote, "remote was unreachable during fetch; attempting push anyway");
        }
        let pushed = ReplicationTransport::new(&self.git, &repo_root, options.lock_timeout)
            .push_snapshot(&resolved, &options.snapshot_path)?;
        summary.push = Some(pushed);
        info!(target = %options.target, "sync finished");
        Ok(summary)
    }
}

/// In-process suspension of the auto-replication hook. The persisted
/// `auto_replication` setting is never touched, so a process killed mid-import
/// leaves the user's choice intact.
#[derive(Debug, Clone, Default)]
pub struct ReplicationPause {
    depth: Rc<Cell<u32>>,
}

impl ReplicationPause {
    pub fn is_paused(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn hold(&self) -> PauseGuard {
        self.depth.set(self.depth.get() + 1);
        PauseGuard {
            depth: Rc::clone(&self.depth),
        }
    }
}

/// Releases one level of pause on drop, including during unwinding.
#[derive(Debug)]
pub struct PauseGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Runs `op` with `pause` held; the pause ends whether or not `op` succeeded.
pub fn with_auto_replication_paused<T, E>(
    pause: &ReplicationPause,
    op: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let _guard = pause.hold();
    op()
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("git CLI is not installed")]
    GitUnavailable,
    #[error("git command failed (code {code:?}): {command} ({stderr})")]
    GitCommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("'{}' is not inside a git repository", .0.display())]
    NotARepository(PathBuf),
    #[error("invalid sync target: {0}")]
    InvalidTarget(String),
    #[error("remote '{remote}' has no ref '{remote_ref}'")]
    RemoteRefMissing { remote: String, remote_ref: String },
    #[error("failed to fetch '{remote_ref}' from '{remote}' although it exists: {stderr}")]
    RemoteFetchFailed {
        remote: String,
        remote_ref: String,
        stderr: String,
    },
    #[error("failed to prepare sync worktree '{}': {message}", path.display())]
    WorktreeSetup { path: PathBuf, message: String },
    #[error("push of '{dest_ref}' to '{remote}' was rejected: {stderr}")]
    PushRejected {
        remote: String,
        dest_ref: String,
        stderr: String,
    },
    #[error("remote snapshot {origin} is malformed: {source}")]
    MalformedSnapshot {
        origin: String,
        #[source]
        source: CodecError,
    },
    #[error("snapshot error: {0}")]
    Snapshot(#[source] CodecError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl SyncError {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SyncError::GitCommandFailed { stderr, .. }
            | SyncError::RemoteFetchFailed { stderr, .. }
            | SyncError::PushRejected { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_missing_remote(&self) -> bool {
        match self.stderr() {
            Some(stderr) => {
                let lower = stderr.to_ascii_lowercase();
                lower.contains("no such remote")
                    || lower.contains("could not read from remote repository")
                    || lower.contains("does not appear to be a git repository")
            }
            None => false,
        }
    }

    pub fn is_non_fast_forward(&self) -> bool {
        match self.stderr() {
            Some(stderr) => {
                let lower = stderr.to_ascii_lowercase();
                lower.contains("non-fast-forward")
                    || lower.contains("fetch first")
                    || lower.contains("rejected")
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
