use time::macros::datetime;
use time::OffsetDateTime;

use super::{
    merge_comments, merge_dependency_edges, merge_work_items, ConflictKind, Resolution, Side,
};
use crate::domain::{Comment, DependencyEdge, Priority, Status, WorkItem};

const T0: OffsetDateTime = datetime!(2026-02-01 09:00 UTC);
const T1: OffsetDateTime = datetime!(2026-02-02 09:00 UTC);
const T2: OffsetDateTime = datetime!(2026-02-03 09:00 UTC);
const NOW: OffsetDateTime = datetime!(2026-02-10 12:00 UTC);

fn item(id: &str, updated_at: OffsetDateTime) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        title: format!("item {id}"),
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
        created_at: T0,
        updated_at,
    }
}

fn comment(id: &str, work_item_id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        work_item_id: work_item_id.to_string(),
        author: "ana".to_string(),
        comment: format!("note {id}"),
        references: Vec::new(),
        created_at: T0,
    }
}

#[test]
fn merging_identical_collections_is_conflict_free_identity() {
    let mut a = item("SK-a", T1);
    a.tags = vec!["x".to_string(), "y".to_string()];
    a.priority = Priority::High;
    let b = item("SK-b", T2);
    let items = vec![a, b];

    let result = merge_work_items(&items, &items, NOW);
    assert!(result.conflicts.is_empty());
    assert!(result.conflict_details.is_empty());
    assert_eq!(result.merged, items);
}

#[test]
fn remote_only_items_are_inserted_unchanged() {
    let local = vec![item("SK-a", T1)];
    let remote = vec![item("SK-b", T1)];

    let result = merge_work_items(&local, &remote, NOW);
    assert!(result.conflicts.is_empty());
    let ids: Vec<&str> = result.merged.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["SK-a", "SK-b"]);
    assert_eq!(result.merged[1], remote[0]);
}

#[test]
fn tag_order_alone_is_not_a_difference() {
    let mut local = item("SK-a", T1);
    local.tags = vec!["b".to_string(), "a".to_string()];
    let mut remote = local.clone();
    remote.tags = vec!["a".to_string(), "b".to_string()];

    let result = merge_work_items(&[local.clone()], &[remote], NOW);
    assert!(result.conflicts.is_empty());
    assert_eq!(result.merged, vec![local]);
}

#[test]
fn non_default_beats_default_on_equal_timestamps_and_bumps_updated_at() {
    let local = item("SK-a", T1);
    let mut remote = item("SK-a", T1);
    remote.status = Status::Blocked;

    let result = merge_work_items(&[local], &[remote], NOW);
    let merged = &result.merged[0];
    assert_eq!(merged.status, Status::Blocked);
    assert!(merged.updated_at > T1);
    assert_eq!(merged.updated_at, NOW);

    let detail = &result.conflict_details[0];
    assert_eq!(detail.kind, ConflictKind::ConcurrentEdit);
    assert_eq!(detail.fields.len(), 1);
    assert_eq!(detail.fields[0].field, "status");
    assert_eq!(detail.fields[0].chosen_from, Side::Remote);
    assert_eq!(detail.fields[0].reason, Resolution::RemoteNonDefault);
}

#[test]
fn concurrent_bump_stays_after_tie_when_clock_lags() {
    let local = item("SK-a", T2);
    let mut remote = item("SK-a", T2);
    remote.assignee = "bo".to_string();

    let lagging_now = T1;
    let result = merge_work_items(&[local], &[remote], lagging_now);
    assert!(result.merged[0].updated_at > T2);
}

#[test]
fn newer_update_wins_when_both_sides_set_a_field() {
    let mut local = item("SK-a", T2);
    local.priority = Priority::High;
    let mut remote = item("SK-a", T1);
    remote.priority = Priority::Low;

    let result = merge_work_items(&[local], &[remote], NOW);
    let merged = &result.merged[0];
    assert_eq!(merged.priority, Priority::High);
    assert_eq!(merged.updated_at, T2);

    let detail = &result.conflict_details[0];
    assert_eq!(detail.kind, ConflictKind::DivergentUpdate);
    assert_eq!(detail.fields[0].field, "priority");
    assert_eq!(detail.fields[0].reason, Resolution::NewerUpdate);
    assert!(result.conflicts[0].contains("priority"));
}

#[test]
fn one_sided_non_default_survives_an_older_timestamp() {
    let mut local = item("SK-a", T2);
    local.title = "renamed locally".to_string();
    let mut remote = item("SK-a", T1);
    remote.assignee = "carla".to_string();
    remote.description = "older but only remote wrote it".to_string();

    let result = merge_work_items(&[local], &[remote], NOW);
    let merged = &result.merged[0];
    assert_eq!(merged.title, "renamed locally");
    assert_eq!(merged.assignee, "carla");
    assert_eq!(merged.description, "older but only remote wrote it");
}

#[test]
fn fields_are_resolved_independently() {
    let mut local = item("SK-a", T2);
    local.priority = Priority::Critical;
    local.stage = "review".to_string();
    let mut remote = item("SK-a", T1);
    remote.priority = Priority::Low;
    remote.status = Status::InProgress;

    let merged = &merge_work_items(&[local], &[remote], NOW).merged[0];
    assert_eq!(merged.priority, Priority::Critical);
    assert_eq!(merged.status, Status::InProgress);
    assert_eq!(merged.stage, "review");
}

#[test]
fn tags_are_the_sorted_union() {
    let mut local = item("SK-a", T2);
    local.tags = vec!["ui".to_string(), "api".to_string()];
    let mut remote = item("SK-a", T1);
    remote.tags = vec!["db".to_string(), "ui".to_string()];

    let result = merge_work_items(&[local], &[remote], NOW);
    assert_eq!(
        result.merged[0].tags,
        vec!["api".to_string(), "db".to_string(), "ui".to_string()]
    );
    let tags = result.conflict_details[0]
        .fields
        .iter()
        .find(|field| field.field == "tags")
        .expect("tag detail should be recorded");
    assert_eq!(tags.chosen_from, Side::Both);
    assert_eq!(tags.reason, Resolution::TagUnion);
}

#[test]
fn concurrent_tiebreak_picks_the_canonically_greater_value() {
    let mut local = item("SK-a", T1);
    local.title = "alpha".to_string();
    let mut remote = item("SK-a", T1);
    remote.title = "beta".to_string();

    let result = merge_work_items(&[local], &[remote], NOW);
    assert_eq!(result.merged[0].title, "beta");
    assert_eq!(
        result.conflict_details[0].fields[0].reason,
        Resolution::ConcurrentTiebreak
    );
}

#[test]
fn swapping_sides_changes_only_attribution() {
    let mut a = item("SK-a", T1);
    a.title = "alpha".to_string();
    a.priority = Priority::High;
    a.tags = vec!["one".to_string()];
    let mut b = item("SK-a", T1);
    b.title = "beta".to_string();
    b.status = Status::Completed;
    b.tags = vec!["two".to_string()];

    let mut c = item("SK-c", T1);
    c.assignee = "dee".to_string();
    let mut d = item("SK-c", T2);
    d.assignee = "eli".to_string();
    d.stage = "triage".to_string();

    let forward = merge_work_items(&[a.clone(), c.clone()], &[b.clone(), d.clone()], NOW);
    let backward = merge_work_items(&[b, d], &[a, c], NOW);
    assert_eq!(forward.merged, backward.merged);

    let forward_sides: Vec<Side> = forward.conflict_details[0]
        .fields
        .iter()
        .map(|field| field.chosen_from)
        .collect();
    let backward_sides: Vec<Side> = backward.conflict_details[0]
        .fields
        .iter()
        .map(|field| field.chosen_from)
        .collect();
    assert_ne!(forward_sides, backward_sides);
}

#[test]
fn input_order_does_not_change_the_result() {
    let mut local_a = item("SK-a", T1);
    local_a.stage = "build".to_string();
    let local_b = item("SK-b", T1);
    let mut remote_a = item("SK-a", T2);
    remote_a.stage = "ship".to_string();
    let remote_c = item("SK-c", T0);

    let first = merge_work_items(
        &[local_a.clone(), local_b.clone()],
        &[remote_a.clone(), remote_c.clone()],
        NOW,
    );
    let second = merge_work_items(&[local_b, local_a], &[remote_c, remote_a], NOW);
    assert_eq!(first, second);
}

#[test]
fn created_at_is_kept_from_local_and_updated_at_is_the_max() {
    let mut local = item("SK-a", T1);
    local.created_at = T0;
    let mut remote = item("SK-a", T2);
    remote.created_at = T1;
    remote.deleted_by = "ops".to_string();

    let merged = &merge_work_items(&[local], &[remote], NOW).merged[0];
    assert_eq!(merged.created_at, T0);
    assert_eq!(merged.updated_at, T2);
    assert_eq!(merged.deleted_by, "ops");
}

#[test]
fn tombstone_on_one_side_wins_over_default_open() {
    let local = item("SK-a", T2);
    let mut remote = item("SK-a", T1);
    remote.status = Status::Deleted;
    remote.delete_reason = "duplicate".to_string();

    let merged = &merge_work_items(&[local], &[remote], NOW).merged[0];
    assert!(merged.is_tombstone());
    assert_eq!(merged.delete_reason, "duplicate");
}

#[test]
fn updated_at_only_difference_is_reported_without_fields() {
    let local = item("SK-a", T1);
    let remote = item("SK-a", T2);

    let result = merge_work_items(&[local], &[remote], NOW);
    assert_eq!(result.merged[0].updated_at, T2);
    assert!(result.conflict_details[0].fields.is_empty());
    assert!(result.conflicts[0].ends_with("updatedAt only"));
}

#[test]
fn comments_union_without_duplicates() {
    let shared = comment("C-1", "SK-a");
    let local = vec![shared.clone(), comment("C-2", "SK-a")];
    let remote = vec![comment("C-3", "SK-gone"), shared];

    let merged = merge_comments(&local, &remote);
    let ids: Vec<&str> = merged.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["C-1", "C-2", "C-3"]);
    assert_eq!(merged[2].work_item_id, "SK-gone");
}

#[test]
fn dependency_edges_union_without_duplicates() {
    let local = vec![
        DependencyEdge::new("SK-a", "SK-b"),
        DependencyEdge::new("SK-b", "SK-c"),
    ];
    let remote = vec![
        DependencyEdge::new("SK-b", "SK-c"),
        DependencyEdge::new("SK-a", "SK-missing"),
    ];

    let merged = merge_dependency_edges(&local, &remote);
    assert_eq!(
        merged,
        vec![
            DependencyEdge::new("SK-a", "SK-b"),
            DependencyEdge::new("SK-a", "SK-missing"),
            DependencyEdge::new("SK-b", "SK-c"),
        ]
    );
    assert_eq!(
        merge_dependency_edges(&remote, &local),
        merged,
        "union should not depend on which side is local"
    );
}

#[test]
fn conflict_details_serialize_for_reports() {
    let mut local = item("SK-a", T2);
    local.priority = Priority::High;
    let mut remote = item("SK-a", T1);
    remote.priority = Priority::Low;

    let result = merge_work_items(&[local], &[remote], NOW);
    let json = serde_json::to_value(&result.conflict_details[0]).unwrap();
    assert_eq!(json["item_id"], "SK-a");
    assert_eq!(json["kind"], "divergent_update");
    assert_eq!(json["fields"][0]["chosen_value"], "high");
    assert_eq!(json["fields"][0]["reason"], "newer_update");
}
