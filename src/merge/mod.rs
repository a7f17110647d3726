//! Reconciliation of two independently evolved replicas.
//!
//! Every function here is pure: the caller supplies both collections and, for
//! work items, the wall-clock instant used to break concurrent-edit ties.
//! Outputs are ordered by identity so that the result never depends on the
//! iteration order of either input.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::domain::{normalize_tags, Comment, DependencyEdge, Priority, Status, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Only the local replica moved the field off its default.
    LocalNonDefault,
    /// Only the remote replica moved the field off its default.
    RemoteNonDefault,
    /// Both sides set the field; the newer `updatedAt` won.
    NewerUpdate,
    /// Same `updatedAt`; the canonically greater value won.
    ConcurrentTiebreak,
    /// Tags are never picked, always unioned.
    TagUnion,
}

impl Resolution {
    fn describe(self) -> &'static str {
        match self {
            Resolution::LocalNonDefault => "only local set it",
            Resolution::RemoteNonDefault => "only remote set it",
            Resolution::NewerUpdate => "newer updatedAt",
            Resolution::ConcurrentTiebreak => "concurrent edit, deterministic tiebreak",
            Resolution::TagUnion => "union",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictFieldDetail {
    pub field: &'static str,
    pub local_value: Value,
    pub remote_value: Value,
    pub chosen_value: Value,
    pub chosen_from: Side,
    pub reason: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DivergentUpdate,
    ConcurrentEdit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictDetail {
    pub item_id: String,
    pub kind: ConflictKind,
    #[serde(with = "time::serde::rfc3339")]
    pub local_updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub remote_updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub merged_updated_at: OffsetDateTime,
    pub fields: Vec<ConflictFieldDetail>,
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConflictKind::DivergentUpdate => "diverged",
            ConflictKind::ConcurrentEdit => "concurrent edit",
        };
        write!(f, "{} ({kind}):", self.item_id)?;
        if self.fields.is_empty() {
            return write!(f, " updatedAt only");
        }
        for (idx, field) in self.fields.iter().enumerate() {
            let sep = if idx == 0 { " " } else { "; " };
            write!(
                f,
                "{sep}{} local={} remote={} -> {} ({})",
                field.field,
                field.local_value,
                field.remote_value,
                field.chosen_value,
                field.reason.describe()
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItemMerge {
    pub merged: Vec<WorkItem>,
    pub conflicts: Vec<String>,
    pub conflict_details: Vec<ConflictDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recency {
    LocalNewer,
    RemoteNewer,
    Concurrent,
}

pub fn merge_work_items(
    local: &[WorkItem],
    remote: &[WorkItem],
    now: OffsetDateTime,
) -> WorkItemMerge {
    let mut by_id: BTreeMap<&str, WorkItem> = local
        .iter()
        .map(|item| (item.id.as_str(), item.clone()))
        .collect();
    let mut details = Vec::new();

    let mut remote_sorted: Vec<&WorkItem> = remote.iter().collect();
    remote_sorted.sort_by(|left, right| left.id.cmp(&right.id));

    for remote_item in remote_sorted {
        match by_id.get(remote_item.id.as_str()) {
            None => {
                by_id.insert(remote_item.id.as_str(), remote_item.clone());
            }
            Some(local_item) if local_item.same_content(remote_item) => {}
            Some(local_item) => {
                let (merged, detail) = merge_pair(local_item, remote_item, now);
                details.push(detail);
                by_id.insert(remote_item.id.as_str(), merged);
            }
        }
    }

    WorkItemMerge {
        merged: by_id.into_values().collect(),
        conflicts: details.iter().map(ToString::to_string).collect(),
        conflict_details: details,
    }
}

fn merge_pair(
    local: &WorkItem,
    remote: &WorkItem,
    now: OffsetDateTime,
) -> (WorkItem, ConflictDetail) {
    let recency = match local.updated_at.cmp(&remote.updated_at) {
        Ordering::Greater => Recency::LocalNewer,
        Ordering::Less => Recency::RemoteNewer,
        Ordering::Equal => Recency::Concurrent,
    };

    let mut fields = Vec::new();
    let mut pick = FieldPicker {
        recency,
        fields: &mut fields,
    };

    let title = pick.field("title", &local.title, &remote.title, String::is_empty);
    let description = pick.field(
        "description",
        &local.description,
        &remote.description,
        String::is_empty,
    );
    let status = pick.field("status", &local.status, &remote.status, |value| {
        *value == Status::Open
    });
    let priority = pick.field("priority", &local.priority, &remote.priority, |value| {
        *value == Priority::Medium
    });
    let parent_id = pick.field("parentId", &local.parent_id, &remote.parent_id, |value| {
        value.as_deref().map_or(true, str::is_empty)
    });
    let tags = pick.tags(&local.tags, &remote.tags);
    let assignee = pick.field("assignee", &local.assignee, &remote.assignee, String::is_empty);
    let stage = pick.field("stage", &local.stage, &remote.stage, String::is_empty);
    let issue_type = pick.field(
        "issueType",
        &local.issue_type,
        &remote.issue_type,
        String::is_empty,
    );
    let created_by = pick.field(
        "createdBy",
        &local.created_by,
        &remote.created_by,
        String::is_empty,
    );
    let deleted_by = pick.field(
        "deletedBy",
        &local.deleted_by,
        &remote.deleted_by,
        String::is_empty,
    );
    let delete_reason = pick.field(
        "deleteReason",
        &local.delete_reason,
        &remote.delete_reason,
        String::is_empty,
    );

    let (updated_at, kind) = match recency {
        Recency::Concurrent => (bump_past(local.updated_at, now), ConflictKind::ConcurrentEdit),
        _ => (
            local.updated_at.max(remote.updated_at),
            ConflictKind::DivergentUpdate,
        ),
    };

    let merged = WorkItem {
        id: local.id.clone(),
        title,
        description,
        status,
        priority,
        parent_id,
        tags,
        assignee,
        stage,
        issue_type,
        created_by,
        deleted_by,
        delete_reason,
        created_at: local.created_at,
        updated_at,
    };

    let detail = ConflictDetail {
        item_id: local.id.clone(),
        kind,
        local_updated_at: local.updated_at,
        remote_updated_at: remote.updated_at,
        merged_updated_at: updated_at,
        fields,
    };
    (merged, detail)
}

/// The merged record must sort strictly after the tied timestamp even when
/// the local clock lags behind it.
fn bump_past(tied: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    if now > tied {
        now
    } else {
        tied + Duration::milliseconds(1)
    }
}

struct FieldPicker<'a> {
    recency: Recency,
    fields: &'a mut Vec<ConflictFieldDetail>,
}

impl FieldPicker<'_> {
    fn field<T>(
        &mut self,
        name: &'static str,
        local: &T,
        remote: &T,
        is_default: impl Fn(&T) -> bool,
    ) -> T
    where
        T: Clone + PartialEq + Serialize,
    {
        if local == remote {
            return local.clone();
        }

        let (from, reason) = match (is_default(local), is_default(remote)) {
            (true, false) => (Side::Remote, Resolution::RemoteNonDefault),
            (false, true) => (Side::Local, Resolution::LocalNonDefault),
            _ => match self.recency {
                Recency::LocalNewer => (Side::Local, Resolution::NewerUpdate),
                Recency::RemoteNewer => (Side::Remote, Resolution::NewerUpdate),
                Recency::Concurrent => {
                    if canonical(local) >= canonical(remote) {
                        (Side::Local, Resolution::ConcurrentTiebreak)
                    } else {
                        (Side::Remote, Resolution::ConcurrentTiebreak)
                    }
                }
            },
        };

        let chosen = match from {
            Side::Remote => remote.clone(),
            _ => local.clone(),
        };
        self.fields.push(ConflictFieldDetail {
            field: name,
            local_value: to_value(local),
            remote_value: to_value(remote),
            chosen_value: to_value(&chosen),
            chosen_from: from,
            reason,
        });
        chosen
    }

    fn tags(&mut self, local: &[String], remote: &[String]) -> Vec<String> {
        let union = normalize_tags(local.iter().chain(remote.iter()));
        let local_set: BTreeSet<&str> = local.iter().map(String::as_str).collect();
        let remote_set: BTreeSet<&str> = remote.iter().map(String::as_str).collect();
        if local_set != remote_set {
            self.fields.push(ConflictFieldDetail {
                field: "tags",
                local_value: to_value(&local_set),
                remote_value: to_value(&remote_set),
                chosen_value: to_value(&union),
                chosen_from: Side::Both,
                reason: Resolution::TagUnion,
            });
        }
        union
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn canonical<T: Serialize>(value: &T) -> String {
    to_value(value).to_string()
}

/// Union keyed by comment id. A comment present on both sides is kept once,
/// preferring the local copy.
pub fn merge_comments(local: &[Comment], remote: &[Comment]) -> Vec<Comment> {
    let mut by_id: BTreeMap<&str, &Comment> = BTreeMap::new();
    for comment in local {
        by_id.entry(comment.id.as_str()).or_insert(comment);
    }
    for comment in remote {
        by_id.entry(comment.id.as_str()).or_insert(comment);
    }
    by_id.into_values().cloned().collect()
}

/// Union keyed by `(from_id, to_id)`. Endpoints are not checked here.
pub fn merge_dependency_edges(
    local: &[DependencyEdge],
    remote: &[DependencyEdge],
) -> Vec<DependencyEdge> {
    let union: BTreeSet<&DependencyEdge> = local.iter().chain(remote.iter()).collect();
    union.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests;
