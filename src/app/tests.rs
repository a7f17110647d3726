use std::path::PathBuf;

use time::macros::datetime;
use uuid::Uuid;

use super::{App, AppError, ItemFilter, NewItem, UpdateItemPatch};
use crate::domain::{Priority, Status, WorkItem};
use crate::snapshot::{self, Snapshot};

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("skein-app-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp workspace should be creatable");
    root
}

fn open_app(root: &std::path::Path) -> App {
    App::open(".skein/cache/state.sqlite", root.to_path_buf()).expect("app should open")
}

fn new_item(title: &str) -> NewItem {
    NewItem {
        title: title.to_string(),
        ..NewItem::default()
    }
}

#[test]
fn create_item_persists_and_refreshes_snapshot() {
    let root = unique_workspace();
    let app = open_app(&root);

    let created = app
        .create_item(NewItem {
            title: "  Build merge engine ".to_string(),
            priority: Some("high".to_string()),
            tags: vec!["sync".to_string(), "core".to_string(), "sync".to_string()],
            ..NewItem::default()
        })
        .expect("create should succeed");
    assert!(created.id.starts_with("SK-"));
    assert_eq!(created.title, "Build merge engine");
    assert_eq!(created.priority, Priority::High);
    assert_eq!(created.tags, vec!["core".to_string(), "sync".to_string()]);
    assert!(root.join(".skein/cache/state.sqlite").exists());

    let written = snapshot::read_snapshot(&root.join(".skein/snapshot.jsonl"))
        .expect("snapshot should decode")
        .expect("auto replication should write the snapshot");
    assert_eq!(written.items, vec![created]);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn paused_auto_replication_skips_snapshot_refresh() {
    let root = unique_workspace();
    let app = open_app(&root);
    app.set_auto_replication(false).unwrap();

    app.create_item(new_item("quiet")).unwrap();
    assert!(!root.join(".skein/snapshot.jsonl").exists());
    assert!(!app.auto_replication_enabled().unwrap());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn held_pause_skips_refresh_without_touching_the_setting() {
    let root = unique_workspace();
    let app = open_app(&root);
    let snapshot_path = root.join(".skein/snapshot.jsonl");

    let guard = app.pause.hold();
    app.create_item(new_item("quiet")).unwrap();
    assert!(!snapshot_path.exists());
    assert!(app.auto_replication_enabled().unwrap());
    drop(guard);

    app.create_item(new_item("loud")).unwrap();
    let written = snapshot::read_snapshot(&snapshot_path)
        .unwrap()
        .expect("refresh should resume once the pause ends");
    assert_eq!(written.items.len(), 2);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn update_moves_updated_at_forward_and_edits_tags() {
    let root = unique_workspace();
    let app = open_app(&root);
    let created = app
        .create_item(NewItem {
            title: "tagged".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            ..NewItem::default()
        })
        .unwrap();

    let updated = app
        .update_item(
            &created.id,
            UpdateItemPatch {
                status: Some("in-progress".to_string()),
                add_tags: vec!["c".to_string()],
                remove_tags: vec!["a".to_string()],
                assignee: Some("ana".to_string()),
                ..UpdateItemPatch::default()
            },
        )
        .expect("update should succeed");
    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.tags, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(updated.assignee, "ana");
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    let err = app
        .update_item(&created.id, UpdateItemPatch::default())
        .expect_err("empty patch should be rejected");
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn parent_updates_reject_cycles() {
    let root = unique_workspace();
    let app = open_app(&root);
    let epic = app.create_item(new_item("epic")).unwrap();
    let task = app
        .create_item(NewItem {
            title: "task".to_string(),
            parent: Some(epic.id.clone()),
            ..NewItem::default()
        })
        .unwrap();
    assert_eq!(task.parent_id.as_deref(), Some(epic.id.as_str()));

    let err = app
        .update_item(
            &epic.id,
            UpdateItemPatch {
                parent: Some(task.id.clone()),
                ..UpdateItemPatch::default()
            },
        )
        .expect_err("cycle should be rejected");
    assert!(err.to_string().contains("parent cycle"));

    let cleared = app
        .update_item(
            &task.id,
            UpdateItemPatch {
                parent: Some(String::new()),
                ..UpdateItemPatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.parent_id, None);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn delete_tombstones_and_hides_from_default_listing() {
    let root = unique_workspace();
    let app = open_app(&root);
    let keep = app.create_item(new_item("keep")).unwrap();
    let doomed = app.create_item(new_item("drop")).unwrap();

    let deleted = app
        .delete_item(&doomed.id, Some("bo"), Some("duplicate"))
        .unwrap();
    assert_eq!(deleted.status, Status::Deleted);
    assert_eq!(deleted.deleted_by, "bo");
    assert_eq!(deleted.delete_reason, "duplicate");
    let again = app.delete_item(&doomed.id, None, None).unwrap();
    assert_eq!(again, deleted);

    let visible = app.list_items(&ItemFilter::default()).unwrap();
    assert_eq!(visible, vec![keep.clone()]);
    let everything = app
        .list_items(&ItemFilter {
            include_deleted: true,
            ..ItemFilter::default()
        })
        .unwrap();
    assert_eq!(everything.len(), 2);
    let only_deleted = app
        .list_items(&ItemFilter {
            status: Some("deleted".to_string()),
            ..ItemFilter::default()
        })
        .unwrap();
    assert_eq!(only_deleted, vec![deleted]);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn list_filters_by_tag_and_query() {
    let root = unique_workspace();
    let app = open_app(&root);
    app.create_item(NewItem {
        title: "Fix fetch probe".to_string(),
        tags: vec!["sync".to_string()],
        ..NewItem::default()
    })
    .unwrap();
    app.create_item(new_item("Write docs")).unwrap();

    let tagged = app
        .list_items(&ItemFilter {
            tags: vec!["sync".to_string()],
            ..ItemFilter::default()
        })
        .unwrap();
    assert_eq!(tagged.len(), 1);
    let queried = app
        .list_items(&ItemFilter {
            query: Some("DOCS".to_string()),
            ..ItemFilter::default()
        })
        .unwrap();
    assert_eq!(queried.len(), 1);
    assert_eq!(queried[0].title, "Write docs");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn comments_and_dependencies_show_up_in_detail() {
    let root = unique_workspace();
    let app = open_app(&root);
    let api = app.create_item(new_item("api")).unwrap();
    let db = app.create_item(new_item("db")).unwrap();

    app.add_dependency(&api.id, &db.id).unwrap();
    app.add_dependency(&api.id, &db.id).unwrap();
    let comment = app
        .add_comment(&api.id, "ana", "blocked on schema", vec!["SK-x".to_string()])
        .unwrap();

    let detail = app.show_item(&api.id).unwrap();
    assert_eq!(detail.depends_on, vec![db.id.clone()]);
    assert!(detail.blocks.is_empty());
    assert_eq!(detail.comments, vec![comment]);
    assert_eq!(app.show_item(&db.id).unwrap().blocks, vec![api.id.clone()]);
    assert_eq!(app.list_dependencies(&api.id, "both").unwrap().len(), 1);

    let self_edge = app.add_dependency(&api.id, &api.id).unwrap_err();
    assert!(matches!(self_edge, AppError::InvalidArgument(_)));
    let missing = app.add_comment("SK-missing", "ana", "hi", Vec::new()).unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
    let bad_direction = app.list_dependencies(&api.id, "sideways").unwrap_err();
    assert!(bad_direction.to_string().contains("invalid direction"));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn import_merges_snapshot_file_into_store() {
    let root = unique_workspace();
    let mut app = open_app(&root);
    let local = app.create_item(new_item("shared")).unwrap();

    let mut remote_copy = local.clone();
    remote_copy.priority = Priority::Critical;
    remote_copy.updated_at = local.updated_at + time::Duration::seconds(5);
    let mut foreign = WorkItem::new("foreign", datetime!(2026-01-01 00:00 UTC));
    foreign.status = Status::Blocked;
    let incoming = root.join("incoming.jsonl");
    snapshot::write_snapshot(
        &incoming,
        &Snapshot {
            items: vec![remote_copy.clone(), foreign.clone()],
            ..Snapshot::default()
        },
    )
    .unwrap();

    let summary = app.import(&incoming).expect("import should succeed");
    assert_eq!(summary.items_read, 2);
    assert_eq!(summary.items_imported, 2);
    assert_eq!(summary.conflicts.len(), 1);
    assert!(summary.conflicts[0].contains("priority"));

    let merged = app.show_item(&local.id).unwrap().item;
    assert_eq!(merged.priority, Priority::Critical);
    assert_eq!(app.show_item(&foreign.id).unwrap().item.status, Status::Blocked);
    assert!(app.auto_replication_enabled().unwrap());

    let again = app.import(&incoming).unwrap();
    assert_eq!(again.items_imported, 0);
    assert!(again.conflicts.is_empty());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn export_writes_requested_path_and_fsck_reports_dangling_edges() {
    let root = unique_workspace();
    let mut app = open_app(&root);
    let item = app.create_item(new_item("lonely")).unwrap();

    let target = root.join("out/export.jsonl");
    let summary = app.export(Some(&target)).unwrap();
    assert_eq!(summary.path, target);
    assert_eq!(summary.sha256, snapshot::digest_hex(&std::fs::read(&target).unwrap()));

    assert!(app.fsck().unwrap().ok());
    let dangling = root.join("dangling.jsonl");
    snapshot::write_snapshot(
        &dangling,
        &Snapshot {
            dependencies: vec![crate::domain::DependencyEdge::new(&item.id, "SK-ghost")],
            ..Snapshot::default()
        },
    )
    .unwrap();
    app.import(&dangling).unwrap();
    let report = app.fsck().unwrap();
    assert_eq!(report.issues.len(), 1);
    assert!(report.issues[0].message.contains("SK-ghost"));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn import_of_missing_file_is_invalid_argument() {
    let root = unique_workspace();
    let mut app = open_app(&root);
    let err = app.import(&root.join("nope.jsonl")).unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn invalid_status_and_priority_surface_parse_errors() {
    let root = unique_workspace();
    let app = open_app(&root);
    let status = app
        .create_item(NewItem {
            title: "x".to_string(),
            status: Some("finished".to_string()),
            ..NewItem::default()
        })
        .unwrap_err();
    assert!(matches!(status, AppError::ParseStatus(_)));
    let priority = app
        .create_item(NewItem {
            title: "x".to_string(),
            priority: Some("urgent".to_string()),
            ..NewItem::default()
        })
        .unwrap_err();
    assert!(matches!(priority, AppError::ParsePriority(_)));
    let blank = app.create_item(new_item("   ")).unwrap_err();
    assert!(matches!(blank, AppError::InvalidArgument(_)));

    let _ = std::fs::remove_dir_all(root);
}
