use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Debug, Args)]
#[command(about = "Comment commands.", long_about = "Add or list comments on a work item.")]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum CommentSubcommands {
    #[command(about = "Append a comment to a work item.")]
    Add(CommentAddArgs),
    #[command(about = "List comments on a work item.")]
    List(CommentListArgs),
}

#[derive(Debug, Args)]
pub struct CommentAddArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,
    #[arg(help = "Comment text.")]
    pub text: String,
    #[arg(long, env = "SKEIN_ACTOR", default_value = "", help = "Comment author.")]
    pub author: String,
    #[arg(long = "ref", help = "Referenced id or URL (repeatable).")]
    pub references: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CommentListArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,
    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(
    about = "Dependency commands.",
    long_about = "Add or list dependency edges. `from` depends on `to`."
)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum DepSubcommands {
    #[command(about = "Record that `from` depends on `to`.")]
    Add(DepAddArgs),
    #[command(about = "List dependency edges for a work item.")]
    List(DepListArgs),
}

#[derive(Debug, Args)]
pub struct DepAddArgs {
    #[arg(help = "Dependent work item.")]
    pub from: String,
    #[arg(help = "Work item it depends on.")]
    pub to: String,
}

#[derive(Debug, Args)]
pub struct DepListArgs {
    #[arg(help = "Work item id or unique id fragment.")]
    pub id: String,
    #[arg(
        long,
        default_value = "both",
        help = "Edge direction: outgoing, incoming, or both."
    )]
    pub direction: String,
    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Synchronize with the remote replication ref.")]
pub struct SyncArgs {
    #[arg(long, env = "SKEIN_REMOTE", help = "Remote name (defaults to sync.remote).")]
    pub remote: Option<String>,

    #[arg(
        long,
        env = "SKEIN_BRANCH",
        help = "Branch name or full ref (defaults to sync.branch)."
    )]
    pub branch: Option<String>,

    #[arg(long, help = "Fetch and merge without writing, committing, or pushing.")]
    pub dry_run: bool,

    #[arg(long, help = "Print the sync summary as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Write the local state to a snapshot file.")]
pub struct ExportArgs {
    #[arg(help = "Output path (defaults to sync.snapshot_path).")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[command(about = "Merge a snapshot file into the local store.")]
pub struct ImportArgs {
    #[arg(help = "Snapshot file to merge.")]
    pub path: PathBuf,
    #[arg(long, help = "Print the import summary as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Check local reference integrity.")]
pub struct FsckArgs {
    #[arg(long, help = "Print the report as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Generate shell completions.")]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish, elvish, powershell). Auto-detected if omitted.")]
    pub shell: Option<String>,
}

#[derive(Debug, Args)]
#[command(about = "Config commands.", long_about = "Show the sync config or change local settings.")]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommands {
    #[command(about = "Print the effective config.")]
    Show(ConfigShowArgs),
    #[command(
        name = "auto-replication",
        about = "Show or set whether mutations refresh the snapshot file."
    )]
    AutoReplication(AutoReplicationArgs),
}

#[derive(Debug, Args)]
pub struct ConfigShowArgs {
    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AutoReplicationArgs {
    #[arg(value_parser = ["on", "off"], help = "New setting; omit to print the current one.")]
    pub state: Option<String>,
}
