use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{Comment, DependencyEdge, WorkItem};

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

const AUTO_REPLICATION_KEY: &str = "auto_replication";

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_store_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS work_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    parent_id TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    assignee TEXT NOT NULL DEFAULT '',
    stage TEXT NOT NULL DEFAULT '',
    issue_type TEXT NOT NULL DEFAULT '',
    created_by TEXT NOT NULL DEFAULT '',
    deleted_by TEXT NOT NULL DEFAULT '',
    delete_reason TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    work_item_id TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL,
    references_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dependencies (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    PRIMARY KEY (from_id, to_id)
);

CREATE INDEX IF NOT EXISTS idx_work_items_updated_at ON work_items(updated_at);
CREATE INDEX IF NOT EXISTS idx_work_items_parent_id ON work_items(parent_id);
CREATE INDEX IF NOT EXISTS idx_comments_work_item_id ON comments(work_item_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_to_id ON dependencies(to_id);
"#,
    },
    Migration {
        version: 2,
        name: "sync_meta_v1",
        sql: r#"
INSERT INTO meta (key, value)
VALUES ('auto_replication', 'true')
ON CONFLICT(key) DO NOTHING;
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.name,
                format_timestamp(OffsetDateTime::now_utc())
            ],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> Result<OffsetDateTime> {
    let raw: String = row.get(idx)?;
    OffsetDateTime::parse(&raw, &Rfc3339)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn text_enum_column<T>(row: &Row<'_>, idx: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn json_list_column(row: &Row<'_>, idx: usize) -> Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

const WORK_ITEM_COLUMNS: &str = "id, title, description, status, priority, parent_id, tags_json, \
     assignee, stage, issue_type, created_by, deleted_by, delete_reason, created_at, updated_at";

fn work_item_from_row(row: &Row<'_>) -> Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: text_enum_column(row, 3)?,
        priority: text_enum_column(row, 4)?,
        parent_id: row.get(5)?,
        tags: json_list_column(row, 6)?,
        assignee: row.get(7)?,
        stage: row.get(8)?,
        issue_type: row.get(9)?,
        created_by: row.get(10)?,
        deleted_by: row.get(11)?,
        delete_reason: row.get(12)?,
        created_at: timestamp_column(row, 13)?,
        updated_at: timestamp_column(row, 14)?,
    })
}

pub fn upsert_work_item(conn: &Connection, item: &WorkItem) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO work_items (
    id, title, description, status, priority, parent_id, tags_json,
    assignee, stage, issue_type, created_by, deleted_by, delete_reason,
    created_at, updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
ON CONFLICT(id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    status = excluded.status,
    priority = excluded.priority,
    parent_id = excluded.parent_id,
    tags_json = excluded.tags_json,
    assignee = excluded.assignee,
    stage = excluded.stage,
    issue_type = excluded.issue_type,
    created_by = excluded.created_by,
    deleted_by = excluded.deleted_by,
    delete_reason = excluded.delete_reason,
    created_at = work_items.created_at,
    updated_at = excluded.updated_at
"#,
        params![
            item.id,
            item.title,
            item.description,
            item.status.as_str(),
            item.priority.as_str(),
            item.parent_id,
            json_list(&item.tags),
            item.assignee,
            item.stage,
            item.issue_type,
            item.created_by,
            item.deleted_by,
            item.delete_reason,
            format_timestamp(item.created_at),
            format_timestamp(item.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_work_item(conn: &Connection, id: &str) -> Result<Option<WorkItem>> {
    conn.query_row(
        &format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = ?1"),
        params![id],
        work_item_from_row,
    )
    .optional()
}

/// Full ids are matched exactly; otherwise a unique prefix or suffix match
/// resolves to the item.
pub fn resolve_work_item_id(conn: &Connection, id_or_fragment: &str) -> Result<Option<String>> {
    if let Some(item) = get_work_item(conn, id_or_fragment)? {
        return Ok(Some(item.id));
    }
    let mut stmt = conn.prepare(
        "SELECT id FROM work_items WHERE id LIKE ?1 || '%' OR id LIKE '%' || ?1 ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![id_or_fragment], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;
    if ids.len() == 1 {
        Ok(ids.into_iter().next())
    } else {
        Ok(None)
    }
}

pub fn list_work_items(conn: &Connection) -> Result<Vec<WorkItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WORK_ITEM_COLUMNS} FROM work_items ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([], work_item_from_row)?;
    rows.collect()
}

pub fn insert_comment(conn: &Connection, comment: &Comment) -> Result<bool> {
    let changed = conn.execute(
        r#"
INSERT OR IGNORE INTO comments (id, work_item_id, author, comment, references_json, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
        params![
            comment.id,
            comment.work_item_id,
            comment.author,
            comment.comment,
            json_list(&comment.references),
            format_timestamp(comment.created_at),
        ],
    )?;
    Ok(changed > 0)
}

fn comment_from_row(row: &Row<'_>) -> Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        work_item_id: row.get(1)?,
        author: row.get(2)?,
        comment: row.get(3)?,
        references: json_list_column(row, 4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

pub fn list_comments(conn: &Connection) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, work_item_id, author, comment, references_json, created_at
FROM comments
ORDER BY id ASC
"#,
    )?;
    let rows = stmt.query_map([], comment_from_row)?;
    rows.collect()
}

pub fn list_comments_for(conn: &Connection, work_item_id: &str) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, work_item_id, author, comment, references_json, created_at
FROM comments
WHERE work_item_id = ?1
ORDER BY created_at ASC, id ASC
"#,
    )?;
    let rows = stmt.query_map(params![work_item_id], comment_from_row)?;
    rows.collect()
}

pub fn insert_dependency(conn: &Connection, edge: &DependencyEdge) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO dependencies (from_id, to_id) VALUES (?1, ?2)",
        params![edge.from_id, edge.to_id],
    )?;
    Ok(changed > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
    Both,
}

pub fn list_dependencies(conn: &Connection) -> Result<Vec<DependencyEdge>> {
    let mut stmt =
        conn.prepare("SELECT from_id, to_id FROM dependencies ORDER BY from_id, to_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(DependencyEdge {
            from_id: row.get(0)?,
            to_id: row.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn list_dependencies_for(
    conn: &Connection,
    work_item_id: &str,
    direction: EdgeDirection,
) -> Result<Vec<DependencyEdge>> {
    let sql = match direction {
        EdgeDirection::Incoming => {
            "SELECT from_id, to_id FROM dependencies WHERE to_id = ?1 ORDER BY from_id, to_id"
        }
        EdgeDirection::Outgoing => {
            "SELECT from_id, to_id FROM dependencies WHERE from_id = ?1 ORDER BY from_id, to_id"
        }
        EdgeDirection::Both => {
            "SELECT from_id, to_id FROM dependencies WHERE from_id = ?1 OR to_id = ?1 \
             ORDER BY from_id, to_id"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![work_item_id], |row| {
        Ok(DependencyEdge {
            from_id: row.get(0)?,
            to_id: row.get(1)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub items: u64,
    pub dependencies_added: u64,
}

/// Bulk upsert of items and insert of edges in one transaction.
pub fn import_items_and_dependencies(
    conn: &mut Connection,
    items: &[WorkItem],
    dependencies: &[DependencyEdge],
) -> Result<ImportCounts> {
    let tx = conn.transaction()?;
    let mut counts = ImportCounts::default();
    for item in items {
        upsert_work_item(&tx, item)?;
        counts.items += 1;
    }
    for edge in dependencies {
        if insert_dependency(&tx, edge)? {
            counts.dependencies_added += 1;
        }
    }
    tx.commit()?;
    Ok(counts)
}

pub fn import_comments(conn: &mut Connection, comments: &[Comment]) -> Result<u64> {
    let tx = conn.transaction()?;
    let mut added = 0u64;
    for comment in comments {
        if insert_comment(&tx, comment)? {
            added += 1;
        }
    }
    tx.commit()?;
    Ok(added)
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

pub fn auto_replication_enabled(conn: &Connection) -> Result<bool> {
    Ok(get_meta(conn, AUTO_REPLICATION_KEY)?.as_deref() != Some("false"))
}

pub fn set_auto_replication(conn: &Connection, enabled: bool) -> Result<()> {
    set_meta(
        conn,
        AUTO_REPLICATION_KEY,
        if enabled { "true" } else { "false" },
    )
}
