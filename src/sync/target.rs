use std::fmt;

use serde::Serialize;

use super::SyncError;

/// Private namespace for tracking refs of non-branch targets. Kept apart from
/// `refs/remotes/` so fetches never clobber ordinary remote-tracking branches.
pub const PRIVATE_TRACKING_PREFIX: &str = "refs/skein/remotes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncTarget {
    pub remote: String,
    pub branch: String,
}

impl SyncTarget {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    pub fn resolve(&self) -> Result<ResolvedTarget, SyncError> {
        validate_component("remote", &self.remote)?;
        let branch = self.branch.trim();
        validate_component("branch", branch)?;

        let kind = match branch.strip_prefix("refs/heads/") {
            Some(short) => RefKind::Branch(short.to_string()),
            None if branch.starts_with("refs/") => RefKind::Explicit(branch.to_string()),
            None => RefKind::Branch(branch.to_string()),
        };
        validate_component("branch", kind.short())?;

        let (remote_ref, tracking_ref) = match &kind {
            RefKind::Branch(name) => (
                format!("refs/heads/{name}"),
                format!("refs/remotes/{}/{name}", self.remote),
            ),
            RefKind::Explicit(full) => (
                full.clone(),
                format!(
                    "{PRIVATE_TRACKING_PREFIX}/{}/{}",
                    self.remote,
                    full.trim_start_matches("refs/")
                ),
            ),
        };

        Ok(ResolvedTarget {
            remote: self.remote.clone(),
            kind,
            remote_ref,
            tracking_ref,
        })
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    Branch(String),
    Explicit(String),
}

impl RefKind {
    fn short(&self) -> &str {
        match self {
            RefKind::Branch(name) => name,
            RefKind::Explicit(full) => full.trim_start_matches("refs/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub remote: String,
    pub kind: RefKind,
    /// Fully-qualified ref on the remote, also the push destination.
    pub remote_ref: String,
    /// Local ref mirroring `remote_ref` after a fetch.
    pub tracking_ref: String,
}

impl ResolvedTarget {
    /// Forced so a rewritten remote ref never leaves a stale tracking ref.
    pub fn fetch_refspec(&self) -> String {
        format!("+{}:{}", self.remote_ref, self.tracking_ref)
    }

    pub fn push_refspec(&self) -> String {
        format!("HEAD:{}", self.remote_ref)
    }

    /// Branch name used when bootstrapping an orphan history for this target.
    pub fn orphan_branch_name(&self) -> String {
        match &self.kind {
            RefKind::Branch(name) => name.clone(),
            RefKind::Explicit(full) => full.trim_start_matches("refs/").replace('/', "-"),
        }
    }
}

fn validate_component(field: &'static str, value: &str) -> Result<(), SyncError> {
    let invalid = value.is_empty()
        || value.starts_with('-')
        || value.ends_with('/')
        || value.ends_with(".lock")
        || value.contains("..")
        || value.contains("//")
        || value
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control() || "~^:?*[\\".contains(ch));
    if invalid {
        return Err(SyncError::InvalidTarget(format!(
            "{field} '{value}' is not a valid git ref component"
        )));
    }
    Ok(())
}
