mod app;
mod cli;
mod cli_ops;
mod completions;
mod config;
mod db;
mod domain;
mod fsck;
mod hierarchy;
mod init;
mod locks;
#[cfg(test)]
mod main_tests;
mod merge;
mod snapshot;
mod sync;
mod ui;

use app::{App, AppError, ItemFilter, NewItem, SyncRequest, UpdateItemPatch};
use cli::{Commands, CommentSubcommands, ConfigSubcommands, DepSubcommands};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

/// `SKEIN_LOG` wins over `-v`; logs go to stderr so JSON output stays clean.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "skein=debug" } else { "skein=warn" };
    let filter = EnvFilter::try_from_env("SKEIN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Init => {
            init::init_all(&cli.repo_root, &cli.db)?;
            println!("skein init completed");
            return Ok(());
        }
        Commands::Completions(args) => {
            return completions::run_completions_command(args.shell.as_deref());
        }
        _ => {}
    }

    let mut app = App::open(&cli.db, cli.repo_root)?;
    run_command(&mut app, cli.command)
}

fn run_command(app: &mut App, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::New(args) => {
            let item = app.create_item(NewItem {
                title: args.title,
                description: args.desc,
                status: args.status,
                priority: args.priority,
                parent: args.parent,
                tags: args.tags,
                assignee: args.assignee,
                issue_type: args.issue_type,
                created_by: args.created_by,
            })?;
            if args.json {
                print_json(&item)?;
            } else {
                print!("created ");
                ui::print_item_line(&item);
            }
        }
        Commands::Update(args) => {
            let item = app.update_item(
                &args.id,
                UpdateItemPatch {
                    title: args.title,
                    description: args.desc,
                    status: args.status,
                    priority: args.priority,
                    parent: args.parent,
                    add_tags: args.add_tags,
                    remove_tags: args.remove_tags,
                    assignee: args.assignee,
                    stage: args.stage,
                    issue_type: args.issue_type,
                },
            )?;
            if args.json {
                print_json(&item)?;
            } else {
                print!("updated ");
                ui::print_item_line(&item);
            }
        }
        Commands::Delete(args) => {
            let item = app.delete_item(&args.id, args.by.as_deref(), args.reason.as_deref())?;
            print!("deleted ");
            ui::print_item_line(&item);
        }
        Commands::Show(args) => {
            let detail = app.show_item(&args.id)?;
            if args.json {
                print_json(&detail)?;
            } else {
                ui::print_item_detail(&detail);
            }
        }
        Commands::Ls(args) => {
            let filter = ItemFilter {
                include_deleted: args.all,
                status: args.status,
                tags: args.tags,
                query: args.query,
            };
            let items = app.list_items(&filter)?;
            if args.json {
                print_json(&items)?;
            } else {
                let rows = if args.tree {
                    hierarchy::layout_items(items)
                } else {
                    hierarchy::flat_items(items)
                };
                ui::print_item_list(&rows, &filter);
            }
        }
        Commands::Comment(args) => run_comment_command(app, args.command)?,
        Commands::Dep(args) => run_dep_command(app, args.command)?,
        Commands::Sync(args) => {
            let summary = app.sync(&SyncRequest {
                remote: args.remote,
                branch: args.branch,
                dry_run: args.dry_run,
            })?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_sync_summary(&summary);
            }
        }
        Commands::Export(args) => {
            let summary = app.export(args.path.as_deref())?;
            println!(
                "exported {} bytes to {} (sha256 {})",
                summary.bytes,
                summary.path.display(),
                summary.sha256
            );
        }
        Commands::Import(args) => {
            let summary = app.import(&args.path)?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_import_summary(&summary);
            }
        }
        Commands::Fsck(args) => {
            let report = app.fsck()?;
            if args.json {
                print_json(&report)?;
            } else {
                ui::print_fsck_report(&report);
            }
            if !report.ok() {
                return Err(AppError::InvalidArgument(format!(
                    "fsck found {} issue(s)",
                    report.issues.len()
                )));
            }
        }
        Commands::Config(args) => run_config_command(app, args.command)?,
        Commands::Init | Commands::Completions(_) => {}
    }
    Ok(())
}

fn run_config_command(app: &App, command: ConfigSubcommands) -> Result<(), AppError> {
    match command {
        ConfigSubcommands::Show(args) => {
            if args.json {
                print_json(app.config())?;
            } else {
                print!("{}", config::render(app.config())?);
            }
        }
        ConfigSubcommands::AutoReplication(args) => {
            if let Some(state) = args.state {
                app.set_auto_replication(state == "on")?;
            }
            let enabled = app.auto_replication_enabled()?;
            println!("auto-replication: {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}

fn run_comment_command(app: &App, command: CommentSubcommands) -> Result<(), AppError> {
    match command {
        CommentSubcommands::Add(args) => {
            let comment = app.add_comment(&args.id, &args.author, &args.text, args.references)?;
            println!("added comment {} to {}", comment.id, comment.work_item_id);
        }
        CommentSubcommands::List(args) => {
            let comments = app.list_comments(&args.id)?;
            if args.json {
                print_json(&comments)?;
            } else {
                ui::print_comments(&comments);
            }
        }
    }
    Ok(())
}

fn run_dep_command(app: &App, command: DepSubcommands) -> Result<(), AppError> {
    match command {
        DepSubcommands::Add(args) => {
            let edge = app.add_dependency(&args.from, &args.to)?;
            println!("{} depends on {}", edge.from_id, edge.to_id);
        }
        DepSubcommands::List(args) => {
            let edges = app.list_dependencies(&args.id, &args.direction)?;
            if args.json {
                print_json(&edges)?;
            } else if edges.is_empty() {
                println!("no dependencies");
            } else {
                for edge in edges {
                    println!("{} -> {}", edge.from_id, edge.to_id);
                }
            }
        }
    }
    Ok(())
}
