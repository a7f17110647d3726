use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::status::{Priority, Status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub deleted_by: String,
    #[serde(default)]
    pub delete_reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: new_work_item_id(),
            title: title.into(),
            description: String::new(),
            status: Status::Open,
            priority: Priority::Medium,
            parent_id: None,
            tags: Vec::new(),
            assignee: String::new(),
            stage: String::new(),
            issue_type: String::new(),
            created_by: String::new(),
            deleted_by: String::new(),
            delete_reason: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Field-by-field equality that treats `tags` as a set.
    pub fn same_content(&self, other: &WorkItem) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.status == other.status
            && self.priority == other.priority
            && self.parent_id == other.parent_id
            && tag_set(&self.tags) == tag_set(&other.tags)
            && self.assignee == other.assignee
            && self.stage == other.stage
            && self.issue_type == other.issue_type
            && self.created_by == other.created_by
            && self.deleted_by == other.deleted_by
            && self.delete_reason == other.delete_reason
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
    }

    pub fn is_tombstone(&self) -> bool {
        self.status.is_tombstone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub work_item_id: String,
    #[serde(default)]
    pub author: String,
    pub comment: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub fn new(
        work_item_id: impl Into<String>,
        author: impl Into<String>,
        comment: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: format!("C-{}", Uuid::now_v7()),
            work_item_id: work_item_id.into(),
            author: author.into(),
            comment: comment.into(),
            references: Vec::new(),
            created_at: now,
        }
    }
}

/// `from_id` depends on `to_id`. At most one edge per ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub from_id: String,
    pub to_id: String,
}

impl DependencyEdge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

pub fn new_work_item_id() -> String {
    format!("SK-{}", Uuid::now_v7())
}

pub fn tag_set(tags: &[String]) -> BTreeSet<&str> {
    tags.iter().map(String::as_str).collect()
}

/// Sorted, deduplicated, whitespace-trimmed tags with empties dropped.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = tags
        .into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    set.into_iter().collect()
}
