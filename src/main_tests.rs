use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Cli, Commands, CommentSubcommands, ConfigSubcommands, DepSubcommands};

use super::{print_json, run_command};
use crate::app::App;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("skein").chain(args.iter().copied()))
        .expect("arguments should parse")
}

fn unique_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let cli = parse(&["ls", "--tree", "-C", "/tmp/repo", "--db", "custom.sqlite", "-v"]);
    assert_eq!(cli.repo_root, PathBuf::from("/tmp/repo"));
    assert_eq!(cli.db, "custom.sqlite");
    assert!(cli.verbose);
    match cli.command {
        Commands::Ls(args) => assert!(args.tree && !args.all),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn sync_flags_parse_into_overrides() {
    let cli = parse(&["sync", "--remote", "upstream", "--branch", "refs/heads/tracker", "--dry-run"]);
    match cli.command {
        Commands::Sync(args) => {
            assert_eq!(args.remote.as_deref(), Some("upstream"));
            assert_eq!(args.branch.as_deref(), Some("refs/heads/tracker"));
            assert!(args.dry_run);
            assert!(!args.json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn nested_comment_and_dep_commands_parse() {
    let cli = parse(&["comment", "add", "SK-1", "looks good", "--ref", "SK-2"]);
    match cli.command {
        Commands::Comment(args) => match args.command {
            CommentSubcommands::Add(add) => {
                assert_eq!(add.id, "SK-1");
                assert_eq!(add.text, "looks good");
                assert_eq!(add.references, vec!["SK-2".to_string()]);
            }
            other => panic!("unexpected comment command: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = parse(&["dep", "list", "SK-1", "--direction", "incoming"]);
    match cli.command {
        Commands::Dep(args) => match args.command {
            DepSubcommands::List(list) => assert_eq!(list.direction, "incoming"),
            other => panic!("unexpected dep command: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    assert!(Cli::try_parse_from(["skein"]).is_err());
}

#[test]
fn run_command_creates_and_lists_items() {
    let root = unique_dir("skein-main-test");
    let mut app = App::open(".skein/cache/state.sqlite", root.clone()).expect("app should open");

    run_command(&mut app, parse(&["new", "first", "-t", "cli"]).command)
        .expect("new should succeed");
    run_command(&mut app, parse(&["ls", "--tree"]).command).expect("ls should succeed");

    let items = app
        .list_items(&crate::app::ItemFilter::default())
        .expect("list should succeed");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].tags, vec!["cli".to_string()]);
    assert!(print_json(&items).is_ok());

    let fsck = run_command(&mut app, parse(&["fsck"]).command);
    assert!(fsck.is_ok());
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn config_auto_replication_toggles_the_stored_setting() {
    let cli = parse(&["config", "auto-replication", "off"]);
    match &cli.command {
        Commands::Config(args) => match &args.command {
            ConfigSubcommands::AutoReplication(toggle) => {
                assert_eq!(toggle.state.as_deref(), Some("off"))
            }
            other => panic!("unexpected config command: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(Cli::try_parse_from(["skein", "config", "auto-replication", "maybe"]).is_err());

    let root = unique_dir("skein-main-config");
    let mut app = App::open(".skein/cache/state.sqlite", root.clone()).expect("app should open");
    run_command(&mut app, cli.command).expect("toggle should succeed");
    assert!(!app.auto_replication_enabled().unwrap());

    run_command(&mut app, parse(&["config", "auto-replication", "on"]).command).unwrap();
    assert!(app.auto_replication_enabled().unwrap());
    run_command(&mut app, parse(&["config", "show", "--json"]).command).unwrap();
    run_command(&mut app, parse(&["config", "show"]).command).unwrap();
    let _ = std::fs::remove_dir_all(root);
}
