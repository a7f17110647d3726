use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{normalize_tags, Comment, DependencyEdge, WorkItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub items: Vec<WorkItem>,
    pub comments: Vec<Comment>,
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SnapshotFileSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed snapshot record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {kind} id '{id}' on line {line}")]
    DuplicateId {
        kind: &'static str,
        id: String,
        line: usize,
    },
    #[error("failed to encode snapshot record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("snapshot I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
enum RecordOut<'a> {
    WorkItem(&'a WorkItem),
    Comment(&'a Comment),
    Dependency(&'a DependencyEdge),
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
enum RecordIn {
    WorkItem(WorkItem),
    Comment(Comment),
    Dependency(DependencyEdge),
}

/// Work item and comment ids must be unique within one snapshot.
pub fn decode(blob: &[u8]) -> Result<Snapshot, CodecError> {
    let mut snapshot = Snapshot::default();
    let mut item_ids = HashSet::new();
    let mut comment_ids = HashSet::new();
    for (idx, line) in blob.split(|byte| *byte == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record: RecordIn = serde_json::from_slice(line).map_err(|source| {
            CodecError::Malformed {
                line: idx + 1,
                source,
            }
        })?;
        let duplicate = |kind, id: &str| CodecError::DuplicateId {
            kind,
            id: id.to_string(),
            line: idx + 1,
        };
        match record {
            RecordIn::WorkItem(item) => {
                if !item_ids.insert(item.id.clone()) {
                    return Err(duplicate("work item", &item.id));
                }
                snapshot.items.push(item);
            }
            RecordIn::Comment(comment) => {
                if !comment_ids.insert(comment.id.clone()) {
                    return Err(duplicate("comment", &comment.id));
                }
                snapshot.comments.push(comment);
            }
            RecordIn::Dependency(edge) => snapshot.dependencies.push(edge),
        }
    }
    Ok(snapshot)
}

/// Deterministic encoding: records grouped by kind and sorted by identity,
/// tags sorted, one JSON object per line.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    let mut items: Vec<WorkItem> = snapshot
        .items
        .iter()
        .map(|item| WorkItem {
            tags: normalize_tags(&item.tags),
            ..item.clone()
        })
        .collect();
    items.sort_by(|left, right| left.id.cmp(&right.id));

    let mut comments: Vec<&Comment> = snapshot.comments.iter().collect();
    comments.sort_by(|left, right| left.id.cmp(&right.id));

    let mut dependencies: Vec<&DependencyEdge> = snapshot.dependencies.iter().collect();
    dependencies.sort();
    dependencies.dedup();

    let mut out = Vec::new();
    let records = items
        .iter()
        .map(RecordOut::WorkItem)
        .chain(comments.into_iter().map(RecordOut::Comment))
        .chain(dependencies.into_iter().map(RecordOut::Dependency));
    for record in records {
        serde_json::to_writer(&mut out, &record).map_err(CodecError::Encode)?;
        out.push(b'\n');
    }
    Ok(out)
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<SnapshotFileSummary, CodecError> {
    let bytes = encode(snapshot)?;
    let io_err = |source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;

    Ok(SnapshotFileSummary {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
        sha256: digest_hex(&bytes),
    })
}

/// Returns `None` when the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, CodecError> {
    match std::fs::read(path) {
        Ok(bytes) => decode(&bytes).map(Some),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CodecError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
