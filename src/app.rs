use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::Connection;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::config::{self, Config, ConfigError};
use crate::db::{self, EdgeDirection};
use crate::domain::{
    normalize_tags, Comment, DependencyEdge, ParsePriorityError, ParseStatusError, Priority,
    Status, WorkItem,
};
use crate::fsck::{self, FsckReport};
use crate::merge;
use crate::snapshot::{self, CodecError, Snapshot, SnapshotFileSummary};
use crate::sync::{
    with_auto_replication_paused, ReplicationPause, SyncError, SyncOptions, SyncService,
    SyncSummary,
};

pub struct App {
    conn: Connection,
    repo_root: PathBuf,
    config: Config,
    pause: ReplicationPause,
}

#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub parent: Option<String>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub issue_type: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    /// `Some("")` clears the parent.
    pub parent: Option<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub assignee: Option<String>,
    pub stage: Option<String>,
    pub issue_type: Option<String>,
}

impl UpdateItemPatch {
    fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.priority.is_some()
            || self.parent.is_some()
            || !self.add_tags.is_empty()
            || !self.remove_tags.is_empty()
            || self.assignee.is_some()
            || self.stage.is_some()
            || self.issue_type.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub include_deleted: bool,
    pub status: Option<String>,
    pub tags: Vec<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: WorkItem,
    pub children: Vec<String>,
    pub depends_on: Vec<String>,
    pub blocks: Vec<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportSummary {
    pub path: PathBuf,
    pub items_read: u64,
    pub items_imported: u64,
    pub comments_added: u64,
    pub dependencies_added: u64,
    pub conflicts: Vec<String>,
}

impl App {
    /// Relative `db_path`s resolve against `repo_root`.
    pub fn open(db_path: &str, repo_root: PathBuf) -> Result<Self, AppError> {
        let db_path = resolve_db_path(db_path, &repo_root);
        ensure_parent_dir(&db_path)?;
        let conn = db::open_connection(&db_path.to_string_lossy())?;
        let config = config::load(&repo_root)?;
        Ok(Self {
            conn,
            repo_root,
            config,
            pause: ReplicationPause::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn create_item(&self, input: NewItem) -> Result<WorkItem, AppError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidArgument(
                "title must not be empty".to_string(),
            ));
        }

        let mut item = WorkItem::new(title, OffsetDateTime::now_utc());
        if let Some(description) = input.description {
            item.description = description;
        }
        if let Some(raw) = input.status.as_deref() {
            item.status = Status::from_str(raw)?;
        }
        if let Some(raw) = input.priority.as_deref() {
            item.priority = Priority::from_str(raw)?;
        }
        if let Some(parent) = input.parent.as_deref() {
            item.parent_id = Some(self.resolve_id(parent)?);
        }
        item.tags = normalize_tags(&input.tags);
        item.assignee = input.assignee.unwrap_or_default();
        item.issue_type = input.issue_type.unwrap_or_default();
        item.created_by = input.created_by.unwrap_or_default();

        db::upsert_work_item(&self.conn, &item)?;
        debug!(id = %item.id, "created work item");
        self.replicate();
        Ok(item)
    }

    pub fn update_item(&self, id: &str, patch: UpdateItemPatch) -> Result<WorkItem, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidArgument(
                "update requires at least one field change".to_string(),
            ));
        }
        let mut item = self.require_item(id)?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::InvalidArgument(
                    "title must not be empty".to_string(),
                ));
            }
            item.title = title;
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(raw) = patch.status.as_deref() {
            item.status = Status::from_str(raw)?;
        }
        if let Some(raw) = patch.priority.as_deref() {
            item.priority = Priority::from_str(raw)?;
        }
        if let Some(raw) = patch.parent.as_deref() {
            item.parent_id = if raw.trim().is_empty() {
                None
            } else {
                let parent = self.resolve_id(raw)?;
                self.ensure_no_parent_cycle(&item.id, &parent)?;
                Some(parent)
            };
        }
        if !patch.add_tags.is_empty() || !patch.remove_tags.is_empty() {
            let removed = normalize_tags(&patch.remove_tags);
            let kept = item
                .tags
                .iter()
                .chain(patch.add_tags.iter())
                .filter(|tag| !removed.contains(&tag.trim().to_string()));
            item.tags = normalize_tags(kept);
        }
        if let Some(assignee) = patch.assignee {
            item.assignee = assignee;
        }
        if let Some(stage) = patch.stage {
            item.stage = stage;
        }
        if let Some(issue_type) = patch.issue_type {
            item.issue_type = issue_type;
        }

        item.updated_at = next_updated_at(item.updated_at);
        db::upsert_work_item(&self.conn, &item)?;
        self.replicate();
        Ok(item)
    }

    /// Tombstones the item; rows are never physically removed.
    pub fn delete_item(
        &self,
        id: &str,
        deleted_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<WorkItem, AppError> {
        let mut item = self.require_item(id)?;
        if item.is_tombstone() {
            return Ok(item);
        }
        item.status = Status::Deleted;
        item.deleted_by = deleted_by.unwrap_or_default().to_string();
        item.delete_reason = reason.unwrap_or_default().to_string();
        item.updated_at = next_updated_at(item.updated_at);
        db::upsert_work_item(&self.conn, &item)?;
        self.replicate();
        Ok(item)
    }

    pub fn show_item(&self, id: &str) -> Result<ItemDetail, AppError> {
        let item = self.require_item(id)?;
        let children = db::list_work_items(&self.conn)?
            .into_iter()
            .filter(|candidate| candidate.parent_id.as_deref() == Some(item.id.as_str()))
            .map(|candidate| candidate.id)
            .collect();
        let depends_on = db::list_dependencies_for(&self.conn, &item.id, EdgeDirection::Outgoing)?
            .into_iter()
            .map(|edge| edge.to_id)
            .collect();
        let blocks = db::list_dependencies_for(&self.conn, &item.id, EdgeDirection::Incoming)?
            .into_iter()
            .map(|edge| edge.from_id)
            .collect();
        let comments = db::list_comments_for(&self.conn, &item.id)?;
        Ok(ItemDetail {
            item,
            children,
            depends_on,
            blocks,
            comments,
        })
    }

    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<WorkItem>, AppError> {
        let status = filter
            .status
            .as_deref()
            .map(Status::from_str)
            .transpose()?;
        let wanted_tags = normalize_tags(&filter.tags);
        let query = filter
            .query
            .as_deref()
            .map(|raw| raw.trim().to_ascii_lowercase())
            .filter(|raw| !raw.is_empty());

        let items = db::list_work_items(&self.conn)?
            .into_iter()
            .filter(|item| match status {
                Some(status) => item.status == status,
                None => filter.include_deleted || !item.is_tombstone(),
            })
            .filter(|item| wanted_tags.iter().all(|tag| item.tags.contains(tag)))
            .filter(|item| match query.as_deref() {
                Some(query) => {
                    item.title.to_ascii_lowercase().contains(query)
                        || item.description.to_ascii_lowercase().contains(query)
                }
                None => true,
            })
            .collect();
        Ok(items)
    }

    pub fn add_comment(
        &self,
        item_id: &str,
        author: &str,
        text: &str,
        references: Vec<String>,
    ) -> Result<Comment, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "comment must not be empty".to_string(),
            ));
        }
        let work_item_id = self.resolve_id(item_id)?;
        let mut comment = Comment::new(work_item_id, author, text, OffsetDateTime::now_utc());
        comment.references = references;
        db::insert_comment(&self.conn, &comment)?;
        self.replicate();
        Ok(comment)
    }

    pub fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>, AppError> {
        let id = self.resolve_id(item_id)?;
        Ok(db::list_comments_for(&self.conn, &id)?)
    }

    /// `from` depends on `to`.
    pub fn add_dependency(&self, from: &str, to: &str) -> Result<DependencyEdge, AppError> {
        let from_id = self.resolve_id(from)?;
        let to_id = self.resolve_id(to)?;
        if from_id == to_id {
            return Err(AppError::InvalidArgument(
                "an item cannot depend on itself".to_string(),
            ));
        }
        let edge = DependencyEdge::new(from_id, to_id);
        if db::insert_dependency(&self.conn, &edge)? {
            self.replicate();
        }
        Ok(edge)
    }

    pub fn list_dependencies(
        &self,
        id: &str,
        direction: &str,
    ) -> Result<Vec<DependencyEdge>, AppError> {
        let id = self.resolve_id(id)?;
        let direction = parse_edge_direction(direction)?;
        Ok(db::list_dependencies_for(&self.conn, &id, direction)?)
    }

    pub fn sync(&mut self, request: &SyncRequest) -> Result<SyncSummary, AppError> {
        let sync_config = &self.config.sync;
        let options = SyncOptions {
            target: sync_config.target(request.remote.as_deref(), request.branch.as_deref()),
            snapshot_path: sync_config.snapshot_path.clone(),
            lock_timeout: sync_config.lock_timeout(),
            dry_run: request.dry_run,
        };
        let summary = SyncService::new(&mut self.conn, self.repo_root.clone())
            .with_pause(self.pause.clone())
            .sync(&options)?;
        Ok(summary)
    }

    /// Writes the full local state; defaults to the configured snapshot path.
    pub fn export(&self, path: Option<&Path>) -> Result<SnapshotFileSummary, AppError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_snapshot_path(),
        };
        let snapshot = self.read_all()?;
        Ok(snapshot::write_snapshot(&path, &snapshot)?)
    }

    /// Merges a snapshot file into the local store with the sync merge rules.
    pub fn import(&mut self, path: &Path) -> Result<ImportSummary, AppError> {
        let incoming = snapshot::read_snapshot(path)?.ok_or_else(|| {
            AppError::InvalidArgument(format!("snapshot file '{}' not found", path.display()))
        })?;
        let local = self.read_all()?;

        let items = merge::merge_work_items(&local.items, &incoming.items, OffsetDateTime::now_utc());
        let comments = merge::merge_comments(&local.comments, &incoming.comments);
        let dependencies = merge::merge_dependency_edges(&local.dependencies, &incoming.dependencies);

        let before: HashMap<&str, &WorkItem> = local
            .items
            .iter()
            .map(|item| (item.id.as_str(), item))
            .collect();
        let changed: Vec<WorkItem> = items
            .merged
            .iter()
            .filter(|item| before.get(item.id.as_str()) != Some(item))
            .cloned()
            .collect();

        let conn = &mut self.conn;
        let (counts, comments_added) = with_auto_replication_paused(&self.pause, || {
            let counts = db::import_items_and_dependencies(conn, &changed, &dependencies)?;
            let comments_added = db::import_comments(conn, &comments)?;
            Ok::<_, rusqlite::Error>((counts, comments_added))
        })?;
        self.replicate();

        Ok(ImportSummary {
            path: path.to_path_buf(),
            items_read: incoming.items.len() as u64,
            items_imported: counts.items,
            comments_added,
            dependencies_added: counts.dependencies_added,
            conflicts: items.conflicts,
        })
    }

    pub fn fsck(&self) -> Result<FsckReport, AppError> {
        Ok(fsck::run_fsck(&self.conn)?)
    }

    pub fn auto_replication_enabled(&self) -> Result<bool, AppError> {
        Ok(db::auto_replication_enabled(&self.conn)?)
    }

    /// Persists the user's auto-replication setting.
    pub fn set_auto_replication(&self, enabled: bool) -> Result<(), AppError> {
        Ok(db::set_auto_replication(&self.conn, enabled)?)
    }

    fn default_snapshot_path(&self) -> PathBuf {
        self.repo_root.join(&self.config.sync.snapshot_path)
    }

    fn read_all(&self) -> Result<Snapshot, AppError> {
        Ok(Snapshot {
            items: db::list_work_items(&self.conn)?,
            comments: db::list_comments(&self.conn)?,
            dependencies: db::list_dependencies(&self.conn)?,
        })
    }

    /// Keeps the snapshot file current after local mutations. Failures are
    /// logged; the mutation itself is already committed.
    fn replicate(&self) {
        if self.pause.is_paused() {
            debug!("auto replication paused; skipping snapshot refresh");
            return;
        }
        let enabled = match db::auto_replication_enabled(&self.conn) {
            Ok(enabled) => enabled,
            Err(err) => {
                warn!(error = %err, "unable to read auto replication flag");
                return;
            }
        };
        if !enabled {
            return;
        }
        match self.export(None) {
            Ok(summary) => debug!(path = %summary.path.display(), bytes = summary.bytes, "snapshot refreshed"),
            Err(err) => warn!(error = %err, "failed to refresh snapshot file"),
        }
    }

    fn resolve_id(&self, id_or_fragment: &str) -> Result<String, AppError> {
        let trimmed = id_or_fragment.trim();
        db::resolve_work_item_id(&self.conn, trimmed)?
            .ok_or_else(|| AppError::NotFound(trimmed.to_string()))
    }

    fn require_item(&self, id_or_fragment: &str) -> Result<WorkItem, AppError> {
        let id = self.resolve_id(id_or_fragment)?;
        db::get_work_item(&self.conn, &id)?.ok_or(AppError::NotFound(id))
    }

    fn ensure_no_parent_cycle(&self, id: &str, new_parent: &str) -> Result<(), AppError> {
        let mut cursor = Some(new_parent.to_string());
        let mut seen = HashSet::new();
        while let Some(current) = cursor {
            if current == id {
                return Err(AppError::InvalidArgument(format!(
                    "setting parent '{new_parent}' on '{id}' would create a parent cycle"
                )));
            }
            if !seen.insert(current.clone()) {
                break;
            }
            cursor = db::get_work_item(&self.conn, &current)?.and_then(|item| item.parent_id);
        }
        Ok(())
    }
}

/// `updatedAt` only moves forward, even when the wall clock lags.
fn next_updated_at(previous: OffsetDateTime) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

pub(crate) fn resolve_db_path(db_path: &str, repo_root: &Path) -> PathBuf {
    let path = Path::new(db_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn parse_edge_direction(raw: &str) -> Result<EdgeDirection, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "outgoing" | "out" => Ok(EdgeDirection::Outgoing),
        "incoming" | "in" => Ok(EdgeDirection::Incoming),
        "both" | "all" => Ok(EdgeDirection::Both),
        _ => Err(AppError::InvalidArgument(format!(
            "invalid direction '{raw}': expected outgoing, incoming, or both"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Snapshot(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ParseStatus(#[from] ParseStatusError),
    #[error(transparent)]
    ParsePriority(#[from] ParsePriorityError),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("work item '{0}' not found in local store")]
    NotFound(String),
}

#[cfg(test)]
mod tests;
