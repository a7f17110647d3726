use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::domain::WorkItem;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsckIssueKind {
    DanglingDependency,
    SelfDependency,
    DanglingComment,
    MissingParent,
    ParentCycle,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FsckIssue {
    pub kind: FsckIssueKind,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FsckReport {
    pub items_scanned: u64,
    pub comments_scanned: u64,
    pub dependencies_scanned: u64,
    pub issues: Vec<FsckIssue>,
}

impl FsckReport {
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn run_fsck(conn: &Connection) -> Result<FsckReport, rusqlite::Error> {
    let snapshot = Snapshot {
        items: db::list_work_items(conn)?,
        comments: db::list_comments(conn)?,
        dependencies: db::list_dependencies(conn)?,
    };
    Ok(check(&snapshot))
}

/// Referential checks the merge engine deliberately skips.
pub fn check(snapshot: &Snapshot) -> FsckReport {
    let known: HashSet<&str> = snapshot.items.iter().map(|item| item.id.as_str()).collect();
    let mut issues = Vec::new();

    for edge in &snapshot.dependencies {
        let subject = format!("{} -> {}", edge.from_id, edge.to_id);
        if edge.from_id == edge.to_id {
            issues.push(issue(
                FsckIssueKind::SelfDependency,
                &subject,
                "item depends on itself".to_string(),
            ));
        }
        for endpoint in [&edge.from_id, &edge.to_id] {
            if !known.contains(endpoint.as_str()) {
                issues.push(issue(
                    FsckIssueKind::DanglingDependency,
                    &subject,
                    format!("dependency endpoint '{endpoint}' does not exist"),
                ));
            }
        }
    }

    for comment in &snapshot.comments {
        if !known.contains(comment.work_item_id.as_str()) {
            issues.push(issue(
                FsckIssueKind::DanglingComment,
                &comment.id,
                format!("comment targets unknown item '{}'", comment.work_item_id),
            ));
        }
    }

    for item in &snapshot.items {
        if let Some(parent) = item.parent_id.as_deref() {
            if !known.contains(parent) {
                issues.push(issue(
                    FsckIssueKind::MissingParent,
                    &item.id,
                    format!("parent '{parent}' does not exist"),
                ));
            }
        }
    }

    for cycle in parent_cycles(&snapshot.items) {
        issues.push(issue(
            FsckIssueKind::ParentCycle,
            &cycle[0],
            format!("parent chain loops: {}", cycle.join(" -> ")),
        ));
    }

    FsckReport {
        items_scanned: snapshot.items.len() as u64,
        comments_scanned: snapshot.comments.len() as u64,
        dependencies_scanned: snapshot.dependencies.len() as u64,
        issues,
    }
}

/// Each cycle is reported once, starting from its smallest id.
fn parent_cycles(items: &[WorkItem]) -> Vec<Vec<String>> {
    let parent_of: HashMap<&str, &str> = items
        .iter()
        .filter_map(|item| {
            item.parent_id
                .as_deref()
                .map(|parent| (item.id.as_str(), parent))
        })
        .collect();

    let mut ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    ids.sort_unstable();

    let mut settled: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();
    for start in ids {
        let mut chain: Vec<&str> = Vec::new();
        let mut on_chain: HashSet<&str> = HashSet::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if settled.contains(id) {
                break;
            }
            if !on_chain.insert(id) {
                let begin = chain.iter().position(|entry| *entry == id).unwrap_or(0);
                let mut cycle: Vec<String> =
                    chain[begin..].iter().map(|entry| entry.to_string()).collect();
                let min = cycle
                    .iter()
                    .enumerate()
                    .min_by(|left, right| left.1.cmp(right.1))
                    .map_or(0, |(idx, _)| idx);
                cycle.rotate_left(min);
                cycle.push(cycle[0].clone());
                cycles.push(cycle);
                break;
            }
            chain.push(id);
            cursor = parent_of.get(id).copied();
        }
        settled.extend(chain);
    }
    cycles
}

fn issue(kind: FsckIssueKind, subject: &str, message: String) -> FsckIssue {
    FsckIssue {
        kind,
        subject: subject.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{check, FsckIssueKind};
    use crate::domain::{Comment, DependencyEdge, WorkItem};
    use crate::snapshot::Snapshot;

    fn item(id: &str, parent: Option<&str>) -> WorkItem {
        let mut item = WorkItem::new(id, datetime!(2026-01-01 00:00 UTC));
        item.id = id.to_string();
        item.parent_id = parent.map(str::to_string);
        item
    }

    fn kinds(snapshot: &Snapshot) -> Vec<FsckIssueKind> {
        check(snapshot).issues.into_iter().map(|issue| issue.kind).collect()
    }

    #[test]
    fn clean_graph_reports_no_issues() {
        let snapshot = Snapshot {
            items: vec![item("SK-a", None), item("SK-b", Some("SK-a"))],
            comments: vec![Comment::new("SK-a", "ana", "hi", datetime!(2026-01-01 01:00 UTC))],
            dependencies: vec![DependencyEdge::new("SK-b", "SK-a")],
        };
        let report = check(&snapshot);
        assert!(report.ok(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.items_scanned, 2);
        assert_eq!(report.comments_scanned, 1);
        assert_eq!(report.dependencies_scanned, 1);
    }

    #[test]
    fn flags_dangling_references() {
        let snapshot = Snapshot {
            items: vec![item("SK-a", Some("SK-gone"))],
            comments: vec![Comment::new("SK-nope", "ana", "hi", datetime!(2026-01-01 01:00 UTC))],
            dependencies: vec![
                DependencyEdge::new("SK-a", "SK-missing"),
                DependencyEdge::new("SK-a", "SK-a"),
            ],
        };
        assert_eq!(
            kinds(&snapshot),
            vec![
                FsckIssueKind::DanglingDependency,
                FsckIssueKind::SelfDependency,
                FsckIssueKind::DanglingComment,
                FsckIssueKind::MissingParent,
            ]
        );
    }

    #[test]
    fn reports_each_parent_cycle_once() {
        let snapshot = Snapshot {
            items: vec![
                item("SK-c", Some("SK-a")),
                item("SK-a", Some("SK-b")),
                item("SK-b", Some("SK-c")),
                item("SK-tail", Some("SK-a")),
            ],
            ..Snapshot::default()
        };
        let report = check(&snapshot);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, FsckIssueKind::ParentCycle);
        assert_eq!(report.issues[0].subject, "SK-a");
        assert!(report.issues[0]
            .message
            .contains("SK-a -> SK-b -> SK-c -> SK-a"));
    }
}
