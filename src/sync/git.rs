use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use super::SyncError;

/// Result of probing a remote for a ref with `git ls-remote --exit-code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRefProbe {
    Present,
    Absent,
}

#[derive(Debug, Clone, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn toplevel(&self, cwd: &Path) -> Result<PathBuf, SyncError> {
        let output = self.run_allow_failure(
            cwd,
            vec!["rev-parse".to_string(), "--show-toplevel".to_string()],
        )?;
        if !output.status.success() {
            return Err(SyncError::NotARepository(cwd.to_path_buf()));
        }
        Ok(PathBuf::from(
            String::from_utf8_lossy(&output.stdout).trim(),
        ))
    }

    pub fn common_dir(&self, cwd: &Path) -> Result<PathBuf, SyncError> {
        let raw = self.run_checked(
            cwd,
            vec!["rev-parse".to_string(), "--git-common-dir".to_string()],
        )?;
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(cwd.join(path))
        }
    }

    pub fn fetch_refspec(&self, repo_root: &Path, remote: &str, refspec: &str) -> Result<(), SyncError> {
        self.run_checked(
            repo_root,
            vec![
                "fetch".to_string(),
                "--no-tags".to_string(),
                "--no-write-fetch-head".to_string(),
                remote.to_string(),
                refspec.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn probe_remote_ref(
        &self,
        repo_root: &Path,
        remote: &str,
        remote_ref: &str,
    ) -> Result<RemoteRefProbe, SyncError> {
        let args = vec![
            "ls-remote".to_string(),
            "--exit-code".to_string(),
            remote.to_string(),
            remote_ref.to_string(),
        ];
        let output = self.run_allow_failure(repo_root, args.clone())?;
        match output.status.code() {
            Some(0) => Ok(RemoteRefProbe::Present),
            Some(2) => Ok(RemoteRefProbe::Absent),
            _ => Err(command_failure(repo_root, &args, &output)),
        }
    }

    pub fn rev_parse(&self, cwd: &Path, rev: &str) -> Result<String, SyncError> {
        self.run_checked(cwd, vec!["rev-parse".to_string(), rev.to_string()])
    }

    pub fn ref_exists(&self, cwd: &Path, reference: &str) -> Result<bool, SyncError> {
        let output = self.run_allow_failure(
            cwd,
            vec![
                "rev-parse".to_string(),
                "--verify".to_string(),
                "--quiet".to_string(),
                format!("{reference}^{{commit}}"),
            ],
        )?;
        Ok(output.status.success())
    }

    pub fn update_ref(&self, cwd: &Path, reference: &str, commit: &str) -> Result<(), SyncError> {
        self.run_checked(
            cwd,
            vec![
                "update-ref".to_string(),
                reference.to_string(),
                commit.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_ref(&self, cwd: &Path, reference: &str) -> Result<(), SyncError> {
        self.run_checked(
            cwd,
            vec![
                "update-ref".to_string(),
                "-d".to_string(),
                reference.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn path_exists_at(&self, cwd: &Path, rev: &str, path: &str) -> Result<bool, SyncError> {
        let output = self.run_allow_failure(
            cwd,
            vec![
                "cat-file".to_string(),
                "-e".to_string(),
                format!("{rev}:{path}"),
            ],
        )?;
        Ok(output.status.success())
    }

    /// Streams `git show <rev>:<path>` into `sink` without an intermediate
    /// capped buffer. Returns the number of bytes copied.
    pub fn stream_blob(
        &self,
        cwd: &Path,
        rev: &str,
        path: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, SyncError> {
        let args = vec!["show".to_string(), format!("{rev}:{path}")];
        debug!(command = %display_command(cwd, &args), "git (streaming)");
        let mut child = Command::new("git")
            .arg("-C")
            .arg(cwd)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // stderr drains on its own thread so neither pipe can fill and stall git.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut stderr = String::new();
                pipe.read_to_string(&mut stderr).map(|_| stderr)
            })
        });
        let copied = match child.stdout.take() {
            Some(mut stdout) => std::io::copy(&mut stdout, sink),
            None => Ok(0),
        };
        let stderr = match stderr_reader {
            Some(handle) => handle
                .join()
                .map_err(|_| std::io::Error::other("git stderr reader panicked"))??,
            None => String::new(),
        };
        let status = child.wait()?;
        let copied = copied?;
        if !status.success() {
            return Err(SyncError::GitCommandFailed {
                command: display_command(cwd, &args),
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(copied)
    }

    pub fn branch_exists(&self, cwd: &Path, branch: &str) -> Result<bool, SyncError> {
        let output = self.run_allow_failure(
            cwd,
            vec![
                "show-ref".to_string(),
                "--verify".to_string(),
                "--quiet".to_string(),
                format!("refs/heads/{}", branch),
            ],
        )?;
        Ok(output.status.success())
    }

    pub fn delete_branch(&self, cwd: &Path, branch: &str) -> Result<(), SyncError> {
        self.run_checked(
            cwd,
            vec!["branch".to_string(), "-D".to_string(), branch.to_string()],
        )?;
        Ok(())
    }

    pub fn worktree_add_detached(
        &self,
        repo_root: &Path,
        worktree: &Path,
        rev: &str,
    ) -> Result<(), SyncError> {
        self.run_checked(
            repo_root,
            vec![
                "worktree".to_string(),
                "add".to_string(),
                "--detach".to_string(),
                display_path(worktree),
                rev.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn worktree_remove(&self, repo_root: &Path, worktree: &Path) -> Result<(), SyncError> {
        self.run_checked(
            repo_root,
            vec![
                "worktree".to_string(),
                "remove".to_string(),
                "--force".to_string(),
                display_path(worktree),
            ],
        )?;
        Ok(())
    }

    pub fn worktree_prune(&self, repo_root: &Path) -> Result<(), SyncError> {
        self.run_checked(
            repo_root,
            vec!["worktree".to_string(), "prune".to_string()],
        )?;
        Ok(())
    }

    pub fn checkout_orphan(&self, cwd: &Path, branch: &str) -> Result<(), SyncError> {
        self.run_checked(
            cwd,
            vec![
                "checkout".to_string(),
                "--quiet".to_string(),
                "--orphan".to_string(),
                branch.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn ls_files(&self, cwd: &Path) -> Result<Vec<String>, SyncError> {
        let stdout = self.run_checked(cwd, vec!["ls-files".to_string(), "-z".to_string()])?;
        Ok(stdout
            .split('\0')
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Removes paths from both the index and the checkout.
    pub fn remove_paths(&self, cwd: &Path, paths: &[&str]) -> Result<(), SyncError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec![
            "rm".to_string(),
            "-r".to_string(),
            "-q".to_string(),
            "-f".to_string(),
            "--ignore-unmatch".to_string(),
            "--".to_string(),
        ];
        for path in paths {
            args.push((*path).to_string());
        }
        self.run_checked(cwd, args)?;
        Ok(())
    }

    pub fn add_paths(&self, cwd: &Path, paths: &[&str]) -> Result<(), SyncError> {
        let mut args = vec!["add".to_string(), "-f".to_string(), "--".to_string()];
        for path in paths {
            args.push((*path).to_string());
        }
        self.run_checked(cwd, args)?;
        Ok(())
    }

    pub fn has_staged_changes(&self, cwd: &Path) -> Result<bool, SyncError> {
        let args = vec![
            "diff".to_string(),
            "--cached".to_string(),
            "--quiet".to_string(),
        ];
        let output = self.run_allow_failure(cwd, args.clone())?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_failure(cwd, &args, &output)),
        }
    }

    pub fn commit(&self, cwd: &Path, message: &str) -> Result<String, SyncError> {
        self.run_checked(
            cwd,
            vec![
                "commit".to_string(),
                "--quiet".to_string(),
                "--no-verify".to_string(),
                "--no-gpg-sign".to_string(),
                "-m".to_string(),
                message.to_string(),
            ],
        )?;
        self.rev_parse(cwd, "HEAD")
    }

    pub fn push_refspec(&self, cwd: &Path, remote: &str, refspec: &str) -> Result<(), SyncError> {
        self.run_checked(
            cwd,
            vec![
                "push".to_string(),
                "--no-verify".to_string(),
                "--quiet".to_string(),
                remote.to_string(),
                refspec.to_string(),
            ],
        )?;
        Ok(())
    }

    fn run_checked(&self, cwd: &Path, args: Vec<String>) -> Result<String, SyncError> {
        let output = self.run_allow_failure(cwd, args.clone())?;
        if !output.status.success() {
            return Err(command_failure(cwd, &args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run_allow_failure(&self, cwd: &Path, args: Vec<String>) -> Result<Output, SyncError> {
        debug!(command = %display_command(cwd, &args), "git");
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(cwd).args(&args).stdin(Stdio::null());
        cmd.output().map_err(spawn_error)
    }
}

fn spawn_error(err: std::io::Error) -> SyncError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SyncError::GitUnavailable
    } else {
        SyncError::Io(err)
    }
}

fn command_failure(cwd: &Path, args: &[String], output: &Output) -> SyncError {
    SyncError::GitCommandFailed {
        command: display_command(cwd, args),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Git addresses tree paths with forward slashes on every platform.
pub fn tree_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn display_command(cwd: &Path, args: &[String]) -> String {
    format!("git -C {} {}", cwd.display(), args.join(" "))
}
