use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use super::target::ResolvedTarget;
use super::{GitAdapter, SyncError};
use crate::locks::FileLock;

pub const WORKTREE_LOCK_FILE: &str = "skein-worktree.lock";

/// Throwaway checkout of the sync ref, torn down on drop.
///
/// The repository-wide worktree lock is held for the whole lifetime so that
/// concurrent syncs never race on worktree metadata.
pub struct DisposableWorktree<'a> {
    git: &'a GitAdapter,
    repo_root: PathBuf,
    path: PathBuf,
    scratch_branch: Option<String>,
    // Dropped after `Drop::drop` runs, in this order.
    _dir: TempDir,
    _lock: FileLock,
}

impl<'a> DisposableWorktree<'a> {
    /// Checks out `target`'s tracking ref when it exists, otherwise bootstraps
    /// an empty orphan history from `HEAD`.
    pub fn create(
        git: &'a GitAdapter,
        repo_root: &Path,
        target: &ResolvedTarget,
        lock_timeout: Duration,
    ) -> Result<Self, SyncError> {
        let lock_path = git.common_dir(repo_root)?.join(WORKTREE_LOCK_FILE);
        let lock = FileLock::acquire(&lock_path, lock_timeout)?;

        let dir = tempfile::Builder::new()
            .prefix("skein-sync-")
            .tempdir()
            .map_err(|err| SyncError::WorktreeSetup {
                path: std::env::temp_dir(),
                message: err.to_string(),
            })?;
        let path = dir.path().join("checkout");

        let base = if git.ref_exists(repo_root, &target.tracking_ref)? {
            target.tracking_ref.clone()
        } else if git.ref_exists(repo_root, "HEAD")? {
            "HEAD".to_string()
        } else {
            return Err(SyncError::WorktreeSetup {
                path,
                message: "repository has no commits to anchor a worktree".to_string(),
            });
        };
        let bootstrap = base == "HEAD";

        git.worktree_add_detached(repo_root, &path, &base)
            .map_err(|err| SyncError::WorktreeSetup {
                path: path.clone(),
                message: err.to_string(),
            })?;
        debug!(path = %path.display(), base = %base, "created sync worktree");

        let mut worktree = Self {
            git,
            repo_root: repo_root.to_path_buf(),
            path,
            scratch_branch: None,
            _dir: dir,
            _lock: lock,
        };
        if bootstrap {
            worktree.start_orphan(target)?;
        }
        Ok(worktree)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the checkout started as a fresh orphan history.
    pub fn is_bootstrap(&self) -> bool {
        self.scratch_branch.is_some()
    }

    fn start_orphan(&mut self, target: &ResolvedTarget) -> Result<(), SyncError> {
        let preferred = target.orphan_branch_name();
        let branch = if self.git.branch_exists(&self.repo_root, &preferred)? {
            let suffix = Uuid::now_v7().simple().to_string();
            format!("{preferred}-{}", &suffix[suffix.len() - 8..])
        } else {
            preferred
        };

        self.git.checkout_orphan(&self.path, &branch)?;
        self.scratch_branch = Some(branch);
        self.git.remove_paths(&self.path, &["."])?;
        Ok(())
    }

    /// Best effort: each step runs even when an earlier one failed.
    fn teardown(&mut self) {
        if let Err(err) = self.git.worktree_remove(&self.repo_root, &self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove sync worktree");
            let _ = std::fs::remove_dir_all(&self.path);
        }
        if let Err(err) = self.git.worktree_prune(&self.repo_root) {
            warn!(error = %err, "failed to prune worktree metadata");
        }
        if let Some(branch) = self.scratch_branch.take() {
            let deleted = self
                .git
                .branch_exists(&self.repo_root, &branch)
                .and_then(|exists| {
                    if exists {
                        self.git.delete_branch(&self.repo_root, &branch)
                    } else {
                        Ok(())
                    }
                });
            if let Err(err) = deleted {
                warn!(branch = %branch, error = %err, "failed to delete scratch branch");
            }
        }
    }
}

impl Drop for DisposableWorktree<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}
