use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::SyncTarget;

pub const CONFIG_RELATIVE_PATH: &str = ".skein/config.toml";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "skein";
pub const DEFAULT_SNAPSHOT_PATH: &str = ".skein/snapshot.jsonl";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub remote: String,
    pub branch: String,
    pub snapshot_path: PathBuf,
    pub lock_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            lock_timeout_ms: 10_000,
        }
    }
}

impl SyncConfig {
    /// Explicit overrides (CLI flags or env) take precedence over the file.
    pub fn target(&self, remote: Option<&str>, branch: Option<&str>) -> SyncTarget {
        SyncTarget::new(
            remote.unwrap_or(&self.remote),
            branch.unwrap_or(&self.branch),
        )
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_RELATIVE_PATH)
}

/// A missing config file yields the defaults.
pub fn load(repo_root: &Path) -> Result<Config, ConfigError> {
    let path = config_path(repo_root);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    let config = from_toml(&raw).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.clone(),
            source,
        },
        other => other,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub(crate) fn from_toml(raw: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: PathBuf::from(CONFIG_RELATIVE_PATH),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let sync = &config.sync;
    if sync.remote.trim().is_empty() {
        return Err(ConfigError::Invalid("sync.remote must not be empty".to_string()));
    }
    if sync.branch.trim().is_empty() {
        return Err(ConfigError::Invalid("sync.branch must not be empty".to_string()));
    }
    let relative_and_contained = sync.snapshot_path.components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if sync.snapshot_path.as_os_str().is_empty() || !relative_and_contained {
        return Err(ConfigError::Invalid(format!(
            "sync.snapshot_path '{}' must be a relative path inside the repository",
            sync.snapshot_path.display()
        )));
    }
    Ok(())
}

pub fn render(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Writes the defaults unless a config file already exists.
pub fn write_default_if_missing(repo_root: &Path) -> Result<bool, ConfigError> {
    let path = config_path(repo_root);
    if path.exists() {
        return Ok(false);
    }
    let io_err = |source| ConfigError::Io {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let rendered = render(&Config::default())?;
    std::fs::write(&path, rendered).map_err(io_err)?;
    Ok(true)
}
