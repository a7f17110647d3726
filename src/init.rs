use std::io::{self, Write};
use std::path::Path;

use crate::app::{resolve_db_path, AppError};
use crate::config::{self, CONFIG_RELATIVE_PATH};
use crate::db;
use crate::sync::GitAdapter;

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_BOLD_CYAN: &str = "\x1b[1;36m";
const ANSI_BOLD_GREEN: &str = "\x1b[1;32m";
const ANSI_BOLD_MAGENTA: &str = "\x1b[1;35m";
const ANSI_BOLD_YELLOW: &str = "\x1b[1;33m";

const CACHE_IGNORE_RULE: &str = "/.skein/cache/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InitOutcome {
    pub config_written: bool,
    pub ignore_rules_added: Vec<String>,
}

pub(crate) fn init_all(repo_root: &Path, db_path: &str) -> Result<InitOutcome, AppError> {
    print_banner("skein")?;
    if GitAdapter::new().toplevel(repo_root).is_err() {
        progress_warn("not inside a git repository; sync will fail until one exists")?;
    }

    progress("writing default configuration")?;
    let config_written = config::write_default_if_missing(repo_root)?;
    if config_written {
        progress_ok(&format!("wrote {CONFIG_RELATIVE_PATH}"))?;
    } else {
        progress_ok(&format!("kept existing {CONFIG_RELATIVE_PATH}"))?;
    }
    let config = config::load(repo_root)?;

    let outcome = init_local_store(repo_root, db_path, &config.sync.snapshot_path)?;
    Ok(InitOutcome {
        config_written,
        ..outcome
    })
}

pub(crate) fn init_local_store(
    repo_root: &Path,
    db_path: &str,
    snapshot_path: &Path,
) -> Result<InitOutcome, AppError> {
    let db_path = resolve_db_path(db_path, repo_root);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    progress(&format!("opening local store at {}", db_path.display()))?;
    let _ = db::open_connection(&db_path.to_string_lossy())?;

    progress("ensuring gitignore covers the local cache and snapshot")?;
    let snapshot_rule = format!("/{}", snapshot_path.to_string_lossy().trim_start_matches("./"));
    let ignore_rules_added = ensure_gitignore_rules(repo_root, &[CACHE_IGNORE_RULE, &snapshot_rule])?;
    progress_ok("local store ready")?;
    Ok(InitOutcome {
        config_written: false,
        ignore_rules_added,
    })
}

fn progress(message: &str) -> Result<(), AppError> {
    println!("{ANSI_BOLD_CYAN}•{ANSI_RESET} {message}");
    io::stdout().flush()?;
    Ok(())
}

fn progress_ok(message: &str) -> Result<(), AppError> {
    println!("{ANSI_BOLD_GREEN}✓{ANSI_RESET} {message}");
    io::stdout().flush()?;
    Ok(())
}

fn progress_warn(message: &str) -> Result<(), AppError> {
    println!("{ANSI_BOLD_YELLOW}!{ANSI_RESET} {message}");
    io::stdout().flush()?;
    Ok(())
}

fn print_banner(title: &str) -> Result<(), AppError> {
    println!(
        "{ANSI_BOLD_MAGENTA}{title}{ANSI_RESET} {}",
        env!("CARGO_PKG_VERSION")
    );
    io::stdout().flush()?;
    Ok(())
}

/// Appends each missing rule; returns the rules that were added.
pub(crate) fn ensure_gitignore_rules(
    repo_root: &Path,
    rules: &[&str],
) -> Result<Vec<String>, AppError> {
    let path = repo_root.join(".gitignore");
    let contents = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let missing: Vec<String> = rules
        .iter()
        .filter(|rule| !contains_rule(&contents, rule))
        .map(|rule| rule.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        writeln!(file)?;
    }
    for rule in &missing {
        writeln!(file, "{rule}")?;
    }
    Ok(missing)
}

/// Accepts the rule with or without its leading slash.
fn contains_rule(contents: &str, rule: &str) -> bool {
    let bare = rule.trim_start_matches('/');
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.is_empty())
        .any(|line| line.trim_start_matches('/') == bare)
}
