use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::git::{tree_path, GitAdapter};
use super::target::ResolvedTarget;
use super::worktree::DisposableWorktree;
use super::SyncError;

pub const SNAPSHOT_COMMIT_MESSAGE: &str = "skein: sync snapshot";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushSummary {
    pub dest_ref: String,
    /// The target ref did not exist locally and a new orphan history was started.
    pub bootstrapped: bool,
    pub removed_files: Vec<String>,
    pub committed: bool,
    pub pushed: bool,
    pub commit: Option<String>,
}

/// Publishes the local snapshot file to the sync ref through a disposable
/// worktree. The user's checkout, index, and current branch are never touched.
pub struct ReplicationTransport<'a> {
    git: &'a GitAdapter,
    repo_root: &'a Path,
    lock_timeout: Duration,
}

impl<'a> ReplicationTransport<'a> {
    pub fn new(git: &'a GitAdapter, repo_root: &'a Path, lock_timeout: Duration) -> Self {
        Self {
            git,
            repo_root,
            lock_timeout,
        }
    }

    pub fn push_snapshot(
        &self,
        target: &ResolvedTarget,
        snapshot_path: &Path,
    ) -> Result<PushSummary, SyncError> {
        let source = self.repo_root.join(snapshot_path);
        let rel = tree_path(snapshot_path);
        let worktree =
            DisposableWorktree::create(self.git, self.repo_root, target, self.lock_timeout)?;
        let checkout = worktree.path();

        let removed_files: Vec<String> = self
            .git
            .ls_files(checkout)?
            .into_iter()
            .filter(|path| *path != rel)
            .collect();
        if !removed_files.is_empty() {
            let refs: Vec<&str> = removed_files.iter().map(String::as_str).collect();
            self.git.remove_paths(checkout, &refs)?;
            debug!(count = removed_files.len(), "removed stray files from sync ref");
        }

        let dest = checkout.join(snapshot_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &dest).map_err(|err| SyncError::WorktreeSetup {
            path: source.clone(),
            message: format!("failed to stage snapshot: {err}"),
        })?;
        self.git.add_paths(checkout, &[rel.as_str()])?;

        let committed = self.git.has_staged_changes(checkout)?;
        if !committed {
            debug!(dest_ref = %target.remote_ref, "snapshot unchanged; nothing to push");
            let commit = self.git.rev_parse(checkout, "HEAD").ok();
            return Ok(PushSummary {
                dest_ref: target.remote_ref.clone(),
                bootstrapped: worktree.is_bootstrap(),
                removed_files,
                committed: false,
                pushed: false,
                commit,
            });
        }

        let commit = self.git.commit(checkout, SNAPSHOT_COMMIT_MESSAGE)?;
        self.git
            .push_refspec(checkout, &target.remote, &target.push_refspec())
            .map_err(|err| {
                if err.is_non_fast_forward() {
                    warn!(dest_ref = %target.remote_ref, "remote moved since fetch; re-run sync");
                }
                match err {
                    SyncError::GitCommandFailed { stderr, .. } => SyncError::PushRejected {
                        remote: target.remote.clone(),
                        dest_ref: target.remote_ref.clone(),
                        stderr,
                    },
                    other => other,
                }
            })?;
        self.git
            .update_ref(self.repo_root, &target.tracking_ref, &commit)?;
        info!(
            remote = %target.remote,
            dest_ref = %target.remote_ref,
            commit = %commit,
            "pushed snapshot"
        );

        Ok(PushSummary {
            dest_ref: target.remote_ref.clone(),
            bootstrapped: worktree.is_bootstrap(),
            removed_files,
            committed: true,
            pushed: true,
            commit: Some(commit),
        })
    }
}

