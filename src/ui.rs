use std::io::{self, IsTerminal};

use crate::app::{ImportSummary, ItemDetail, ItemFilter};
use crate::domain::{Comment, Priority, Status, WorkItem};
use crate::fsck::FsckReport;
use crate::hierarchy::DisplayItem;
use crate::sync::{EntityCounts, RemoteState, SyncSummary};

pub fn print_item_list(rows: &[DisplayItem], filter: &ItemFilter) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Work items"));
    if let Some(summary) = filter_summary(filter) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if rows.is_empty() {
        println!("{}", palette.dim("no work items matched"));
        return;
    }

    for row in rows {
        println!("{}", format_item_row(row, &palette));
    }
    println!("{}", palette.dim(&format!("{} item(s)", rows.len())));
}

pub fn print_item_detail(detail: &ItemDetail) {
    let palette = Palette::auto();
    let item = &detail.item;
    println!(
        "{} {} {}",
        palette.id(&item.id),
        palette.status(item.status),
        palette.heading(&item.title)
    );
    println!("{}", field_line(&palette, "priority", item.priority.as_str()));
    if let Some(parent) = item.parent_id.as_deref() {
        println!("{}", field_line(&palette, "parent", parent));
    }
    for (label, value) in [
        ("assignee", &item.assignee),
        ("stage", &item.stage),
        ("type", &item.issue_type),
        ("created by", &item.created_by),
        ("deleted by", &item.deleted_by),
        ("delete reason", &item.delete_reason),
    ] {
        if !value.is_empty() {
            println!("{}", field_line(&palette, label, value));
        }
    }
    if !item.tags.is_empty() {
        println!("{}", field_line(&palette, "tags", &item.tags.join(", ")));
    }
    println!("{}", field_line(&palette, "created", &timestamp(item.created_at)));
    println!("{}", field_line(&palette, "updated", &timestamp(item.updated_at)));

    for (label, ids) in [
        ("children", &detail.children),
        ("depends on", &detail.depends_on),
        ("blocks", &detail.blocks),
    ] {
        if !ids.is_empty() {
            println!("{}", field_line(&palette, label, &ids.join(", ")));
        }
    }

    if !item.description.is_empty() {
        println!();
        println!("{}", item.description);
    }
    if !detail.comments.is_empty() {
        println!();
        print_comment_rows(&detail.comments, &palette);
    }
}

pub fn print_item_line(item: &WorkItem) {
    let palette = Palette::auto();
    println!(
        "{} {} {}",
        palette.id(&item.id),
        palette.status(item.status),
        item.title
    );
}

pub fn print_comments(comments: &[Comment]) {
    let palette = Palette::auto();
    if comments.is_empty() {
        println!("{}", palette.dim("no comments"));
        return;
    }
    print_comment_rows(comments, &palette);
}

fn print_comment_rows(comments: &[Comment], palette: &Palette) {
    println!("{}", palette.heading("Comments"));
    for comment in comments {
        let author = if comment.author.is_empty() {
            "unknown"
        } else {
            comment.author.as_str()
        };
        println!(
            "{} {} {}",
            palette.dim(&timestamp(comment.created_at)),
            palette.id(author),
            comment.comment
        );
        if !comment.references.is_empty() {
            println!(
                "  {}",
                palette.dim(&format!("refs: {}", comment.references.join(", ")))
            );
        }
    }
}

pub fn print_sync_summary(summary: &SyncSummary) {
    let palette = Palette::auto();
    let heading = if summary.dry_run {
        "Sync (dry run)"
    } else {
        "Sync"
    };
    println!(
        "{} {}",
        palette.heading(heading),
        palette.dim(&format!("{}/{}", summary.target.remote, summary.target.branch))
    );
    let remote = match summary.remote_state {
        RemoteState::Fetched => palette.paint("32", "fetched"),
        RemoteState::Missing => palette.paint("33", "missing (will bootstrap)"),
        RemoteState::Unavailable => palette.paint("31", "unavailable"),
    };
    println!("{}", field_line(&palette, "remote", &remote));
    println!("{}", counts_line(&palette, "items", &summary.work_items));
    println!("{}", counts_line(&palette, "comments", &summary.comments));
    println!("{}", counts_line(&palette, "dependencies", &summary.dependencies));

    if !summary.conflicts.is_empty() {
        println!(
            "{}",
            palette.paint("33", &format!("{} conflict(s) resolved", summary.conflicts.len()))
        );
        for conflict in &summary.conflicts {
            println!("  {conflict}");
        }
    }

    if let Some(snapshot) = &summary.snapshot {
        println!(
            "{}",
            field_line(
                &palette,
                "snapshot",
                &format!("{} ({} bytes)", snapshot.path.display(), snapshot.bytes)
            )
        );
    }
    if let Some(push) = &summary.push {
        let outcome = match (push.pushed, push.commit.as_deref()) {
            (true, Some(commit)) => format!("pushed {} to {}", short_sha(commit), push.dest_ref),
            (true, None) => format!("pushed to {}", push.dest_ref),
            (false, _) => format!("{} already up to date", push.dest_ref),
        };
        println!("{}", field_line(&palette, "push", &outcome));
        if push.bootstrapped {
            println!("{}", palette.dim("  created the replication branch"));
        }
        if !push.removed_files.is_empty() {
            println!(
                "{}",
                palette.dim(&format!("  removed: {}", push.removed_files.join(", ")))
            );
        }
    }
}

pub fn print_import_summary(summary: &ImportSummary) {
    let palette = Palette::auto();
    println!(
        "{} {}",
        palette.heading("Import"),
        palette.dim(&summary.path.display().to_string())
    );
    println!(
        "{}",
        field_line(
            &palette,
            "items",
            &format!("read={} imported={}", summary.items_read, summary.items_imported)
        )
    );
    println!(
        "{}",
        field_line(
            &palette,
            "added",
            &format!(
                "comments={} dependencies={}",
                summary.comments_added, summary.dependencies_added
            )
        )
    );
    for conflict in &summary.conflicts {
        println!("  {}", palette.paint("33", conflict));
    }
}

pub fn print_fsck_report(report: &FsckReport) {
    let palette = Palette::auto();
    println!(
        "{} {}",
        palette.heading("fsck"),
        palette.dim(&format!(
            "items={} comments={} dependencies={}",
            report.items_scanned, report.comments_scanned, report.dependencies_scanned
        ))
    );
    if report.ok() {
        println!("{}", palette.paint("32", "no issues found"));
        return;
    }
    for issue in &report.issues {
        println!("{} {}", palette.paint("31", &issue.subject), issue.message);
    }
    println!(
        "{}",
        palette.dim(&format!("{} issue(s)", report.issues.len()))
    );
}

fn format_item_row(row: &DisplayItem, palette: &Palette) -> String {
    let item = &row.item;
    let indent = indentation_prefix(row.depth, palette);
    let mut line = format!(
        "{}{} {} {}",
        indent,
        palette.id(&item.id),
        palette.status(item.status),
        item.title
    );

    if item.priority != Priority::Medium {
        line.push(' ');
        line.push_str(&palette.priority(item.priority));
    }

    if !item.tags.is_empty() {
        line.push(' ');
        line.push_str(&palette.tags(&format!("#{}", item.tags.join(" #"))));
    }

    line
}

fn indentation_prefix(depth: usize, palette: &Palette) -> String {
    if depth == 0 {
        return String::new();
    }
    let spaces = "  ".repeat(depth.saturating_sub(1));
    palette.dim(&format!("{spaces}↳ "))
}

fn field_line(palette: &Palette, label: &str, value: &str) -> String {
    format!("{} {value}", palette.dim(&format!("{label}:")))
}

fn counts_line(palette: &Palette, label: &str, counts: &EntityCounts) -> String {
    field_line(
        palette,
        label,
        &format!(
            "local={} remote={} merged={} imported={}",
            counts.local, counts.remote, counts.merged, counts.imported
        ),
    )
}

fn timestamp(value: time::OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}

fn short_sha(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}

fn filter_summary(filter: &ItemFilter) -> Option<String> {
    let mut parts = Vec::new();
    if filter.include_deleted {
        parts.push("all=true".to_string());
    }
    if let Some(status) = filter.status.as_deref().and_then(non_empty) {
        parts.push(format!("status={status}"));
    }
    let tags = filter
        .tags
        .iter()
        .filter_map(|tag| non_empty(tag))
        .collect::<Vec<_>>();
    if !tags.is_empty() {
        parts.push(format!("tags={}", tags.join(",")));
    }
    if let Some(query) = filter.query.as_deref().and_then(non_empty) {
        parts.push(format!("query={query}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn status(&self, status: Status) -> String {
        let upper = status.as_str().to_ascii_uppercase();
        self.paint(status_color_code(status), &format!("[{upper}]"))
    }

    fn priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::Critical => "1;31",
            Priority::High => "33",
            Priority::Medium | Priority::Low => "90",
        };
        self.paint(code, &format!("!{}", priority.as_str()))
    }

    fn tags(&self, text: &str) -> String {
        self.paint("90", text)
    }
}

fn status_color_code(status: Status) -> &'static str {
    match status {
        Status::Open => "36",
        Status::InProgress => "33",
        Status::Blocked => "31",
        Status::Completed => "32",
        Status::Deleted => "90",
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{filter_summary, format_item_row, short_sha, Palette};
    use crate::app::ItemFilter;
    use crate::domain::{Priority, WorkItem};
    use crate::hierarchy::DisplayItem;

    #[test]
    fn filter_summary_formats_only_active_filters() {
        let filter = ItemFilter {
            include_deleted: false,
            status: Some("blocked".to_string()),
            tags: vec!["release".to_string(), "".to_string()],
            query: Some("sync".to_string()),
        };

        let summary = filter_summary(&filter).expect("summary should exist");
        assert_eq!(summary, "status=blocked tags=release query=sync");
    }

    #[test]
    fn filter_summary_is_none_for_empty_filters() {
        assert!(filter_summary(&ItemFilter::default()).is_none());
        let all = ItemFilter {
            include_deleted: true,
            ..ItemFilter::default()
        };
        assert_eq!(filter_summary(&all).as_deref(), Some("all=true"));
    }

    #[test]
    fn rows_show_depth_priority_and_tags_without_color() {
        let mut item = WorkItem::new("Ship it", datetime!(2026-01-01 00:00 UTC));
        item.id = "SK-1".to_string();
        item.priority = Priority::High;
        item.tags = vec!["a".to_string(), "b".to_string()];
        let palette = Palette { enabled: false };

        let row = format_item_row(&DisplayItem { item, depth: 2 }, &palette);
        assert_eq!(row, "  ↳ SK-1 [OPEN] Ship it !high #a #b");
    }

    #[test]
    fn short_sha_handles_short_input() {
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("0123456789abcdef"), "0123456789ab");
    }
}
