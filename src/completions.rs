use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::app::AppError;
use crate::cli::Cli;

const BIN_NAME: &str = "skein";

pub fn generate_completions(shell: Shell, buf: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN_NAME, buf);
}

fn shell_from_path(shell_var: &str) -> Option<Shell> {
    let basename = shell_var.rsplit('/').next()?;
    parse_shell(basename)
}

fn parse_shell(raw: &str) -> Option<Shell> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "powershell" | "pwsh" => Some(Shell::PowerShell),
        _ => None,
    }
}

pub fn run_completions_command(shell_arg: Option<&str>) -> Result<(), AppError> {
    let shell = match shell_arg {
        Some(name) => parse_shell(name)
            .ok_or_else(|| AppError::InvalidArgument(format!("unknown shell '{name}'")))?,
        None => std::env::var("SHELL")
            .ok()
            .as_deref()
            .and_then(shell_from_path)
            .ok_or_else(|| {
                AppError::InvalidArgument(
                    "unable to detect shell from $SHELL; pass a shell name".to_string(),
                )
            })?,
    };

    let mut stdout = io::stdout().lock();
    generate_completions(shell, &mut stdout);
    Ok(())
}
