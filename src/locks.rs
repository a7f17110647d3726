use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock busy: {} (another sync may be running)", .0.display())]
    Busy(PathBuf),
    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive lock backed by a create-new file; released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    _file: File,
}

impl FileLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let start = Instant::now();
        loop {
            match try_acquire(path)? {
                Some(guard) => return Ok(guard),
                None if start.elapsed() >= timeout => {
                    return Err(LockError::Busy(path.to_path_buf()));
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_acquire(path: &Path) -> Result<Option<FileLock>, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            if let Err(err) = writeln!(file, "{}", std::process::id()) {
                warn!(path = %path.display(), error = %err, "failed to record lock owner pid");
            }
            Ok(Some(FileLock {
                path: path.to_path_buf(),
                _file: file,
            }))
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(LockError::Io(err)),
    }
}
