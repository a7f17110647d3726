use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

pub use crate::cli_ops::*;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "skein")]
#[command(bin_name = "skein")]
#[command(version)]
#[command(about = "A decentralized, git-replicated work-item tracker")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "SKEIN_DB_PATH",
        default_value = ".skein/cache/state.sqlite",
        global = true,
        help = "Path to the local SQLite store, relative to the repository root."
    )]
    pub db: String,

    #[arg(
        short = 'C',
        long,
        env = "SKEIN_REPO_ROOT",
        default_value = ".",
        global = true,
        help = "Repository root that contains .skein/."
    )]
    pub repo_root: PathBuf,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Log engine activity to stderr (overridden by SKEIN_LOG)."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Write default config, open the local store, and add gitignore rules.")]
    Init,
    #[command(about = "Create a new work item.")]
    New(NewArgs),
    #[command(about = "Update work item fields.")]
    Update(UpdateArgs),
    #[command(about = "Tombstone a work item.")]
    Delete(DeleteArgs),
    #[command(about = "Show one work item with its comments and dependencies.")]
    Show(ShowArgs),
    #[command(about = "List work items.")]
    Ls(ListArgs),
    #[command(about = "Add or list comments.")]
    Comment(CommentArgs),
    #[command(about = "Add or list dependency edges.")]
    Dep(DepArgs),
    #[command(about = "Fetch, merge, and push the replicated snapshot.")]
    Sync(SyncArgs),
    #[command(about = "Write the local state to a snapshot file.")]
    Export(ExportArgs),
    #[command(about = "Merge a snapshot file into the local store.")]
    Import(ImportArgs),
    #[command(about = "Check dependency, comment, and parent references.")]
    Fsck(FsckArgs),
    #[command(about = "Show config or toggle auto replication.")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
#[command(about = "Create a new work item.")]
pub struct NewArgs {
    #[arg(help = "Work item title.")]
    pub title: String,

    #[arg(long = "desc", help = "Optional description text.")]
    pub desc: Option<String>,

    #[arg(short = 's', long, help = "Initial status (defaults to open).")]
    pub status: Option<String>,

    #[arg(short = 'p', long, help = "Priority: critical, high, medium, or low.")]
    pub priority: Option<String>,

    #[arg(long, help = "Parent work item id or unique id fragment.")]
    pub parent: Option<String>,

    #[arg(short = 't', long = "tag", help = "Tag to attach (repeatable).")]
    pub tags: Vec<String>,

    #[arg(short = 'a', long, help = "Assignee.")]
    pub assignee: Option<String>,

    #[arg(long = "type", help = "Free-form issue type label.")]
    pub issue_type: Option<String>,

    #[arg(long, env = "SKEIN_ACTOR", help = "Recorded as the item's creator.")]
    pub created_by: Option<String>,

    #[arg(long, help = "Print the created item as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Update work item fields.")]
pub struct UpdateArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,

    #[arg(long, help = "New title.")]
    pub title: Option<String>,

    #[arg(long = "desc", help = "New description.")]
    pub desc: Option<String>,

    #[arg(short = 's', long, help = "New status.")]
    pub status: Option<String>,

    #[arg(short = 'p', long, help = "New priority.")]
    pub priority: Option<String>,

    #[arg(long, help = "New parent id; pass an empty string to clear.")]
    pub parent: Option<String>,

    #[arg(long = "add-tag", help = "Tag to add (repeatable).")]
    pub add_tags: Vec<String>,

    #[arg(long = "remove-tag", help = "Tag to remove (repeatable).")]
    pub remove_tags: Vec<String>,

    #[arg(short = 'a', long, help = "New assignee.")]
    pub assignee: Option<String>,

    #[arg(long, help = "Free-form workflow stage.")]
    pub stage: Option<String>,

    #[arg(long = "type", help = "Free-form issue type label.")]
    pub issue_type: Option<String>,

    #[arg(long, help = "Print the updated item as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Tombstone a work item.")]
pub struct DeleteArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,

    #[arg(long, env = "SKEIN_ACTOR", help = "Recorded as the item's deleter.")]
    pub by: Option<String>,

    #[arg(short = 'r', long, help = "Reason for deletion.")]
    pub reason: Option<String>,
}

#[derive(Debug, Args)]
#[command(about = "Show one work item.")]
pub struct ShowArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,

    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "List work items.")]
pub struct ListArgs {
    #[arg(long, help = "Include tombstoned items.")]
    pub all: bool,

    #[arg(short = 's', long, help = "Only items with this status.")]
    pub status: Option<String>,

    #[arg(short = 't', long = "tag", help = "Only items carrying this tag (repeatable).")]
    pub tags: Vec<String>,

    #[arg(short = 'q', long, help = "Case-insensitive title/description search.")]
    pub query: Option<String>,

    #[arg(long, help = "Indent children below their parent.")]
    pub tree: bool,

    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}
