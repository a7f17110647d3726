use std::path::Path;

use tracing::{debug, warn};

use super::git::{tree_path, GitAdapter, RemoteRefProbe};
use super::target::ResolvedTarget;
use super::SyncError;

/// What a fetch learned about the remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSnapshot {
    /// The ref was fetched; `blob` is `None` when the snapshot path is absent
    /// from its tip.
    Fetched {
        tracking_ref: String,
        commit: String,
        blob: Option<Vec<u8>>,
    },
    /// The remote is reachable but does not carry the ref yet.
    Missing,
    /// Neither the fetch nor the listing probe could reach the remote.
    Unavailable { reason: String },
}

impl RemoteSnapshot {
    pub fn blob(&self) -> Option<&[u8]> {
        match self {
            RemoteSnapshot::Fetched { blob, .. } => blob.as_deref(),
            _ => None,
        }
    }
}

pub struct RemoteFetcher<'a> {
    git: &'a GitAdapter,
    repo_root: &'a Path,
}

impl<'a> RemoteFetcher<'a> {
    pub fn new(git: &'a GitAdapter, repo_root: &'a Path) -> Self {
        Self { git, repo_root }
    }

    pub fn fetch(
        &self,
        target: &ResolvedTarget,
        snapshot_path: &Path,
    ) -> Result<RemoteSnapshot, SyncError> {
        if let Err(fetch_err) =
            self.git
                .fetch_refspec(self.repo_root, &target.remote, &target.fetch_refspec())
        {
            return self.classify_fetch_failure(target, fetch_err);
        }

        let commit = self.git.rev_parse(self.repo_root, &target.tracking_ref)?;
        let blob = self.read_blob(&target.tracking_ref, snapshot_path)?;
        debug!(
            tracking_ref = %target.tracking_ref,
            commit = %commit,
            bytes = blob.as_ref().map_or(0, Vec::len),
            "fetched remote snapshot"
        );
        Ok(RemoteSnapshot::Fetched {
            tracking_ref: target.tracking_ref.clone(),
            commit,
            blob,
        })
    }

    /// Reads `<rev>:<path>` in full, streaming the child's stdout.
    pub fn read_blob(&self, rev: &str, snapshot_path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
        let path = tree_path(snapshot_path);
        if !self.git.path_exists_at(self.repo_root, rev, &path)? {
            return Ok(None);
        }
        let mut buffer = Vec::new();
        self.git
            .stream_blob(self.repo_root, rev, &path, &mut buffer)?;
        Ok(Some(buffer))
    }

    fn classify_fetch_failure(
        &self,
        target: &ResolvedTarget,
        fetch_err: SyncError,
    ) -> Result<RemoteSnapshot, SyncError> {
        if !matches!(fetch_err, SyncError::GitCommandFailed { .. }) {
            return Err(fetch_err);
        }
        if fetch_err.is_missing_remote() {
            warn!(remote = %target.remote, error = %fetch_err, "remote unreachable; continuing with local state only");
            return Ok(RemoteSnapshot::Unavailable {
                reason: fetch_err.to_string(),
            });
        }

        match self
            .git
            .probe_remote_ref(self.repo_root, &target.remote, &target.remote_ref)
        {
            Ok(RemoteRefProbe::Present) => Err(SyncError::RemoteFetchFailed {
                remote: target.remote.clone(),
                remote_ref: target.remote_ref.clone(),
                stderr: fetch_err.stderr().unwrap_or_default().to_string(),
            }),
            Ok(RemoteRefProbe::Absent) => {
                let missing = SyncError::RemoteRefMissing {
                    remote: target.remote.clone(),
                    remote_ref: target.remote_ref.clone(),
                };
                debug!(%missing, "treating remote state as empty");
                if self.git.ref_exists(self.repo_root, &target.tracking_ref)? {
                    self.git.delete_ref(self.repo_root, &target.tracking_ref)?;
                }
                Ok(RemoteSnapshot::Missing)
            }
            Err(SyncError::GitUnavailable) => Err(SyncError::GitUnavailable),
            Err(probe_err) => {
                warn!(
                    remote = %target.remote,
                    error = %probe_err,
                    "remote unreachable; continuing with local state only"
                );
                Ok(RemoteSnapshot::Unavailable {
                    reason: fetch_err.to_string(),
                })
            }
        }
    }
}
