use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use crate::domain::entities::{ChunkAssociation, File, GlobalChunk, GlobalFile};
use crate::domain::repositories::{StoreError, StoreResult};
use crate::domain::value_objects::{ChunkHash, ContentHash};

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of the in-memory store at the last checkpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub global_files: Vec<GlobalFile>,
    pub global_chunks: Vec<GlobalChunk>,
    pub chunk_associations: Vec<ChunkAssociation>,
    pub files: Vec<File>,
}

impl Snapshot {
    pub fn new(
        global_files: Vec<GlobalFile>,
        global_chunks: Vec<GlobalChunk>,
        chunk_associations: Vec<ChunkAssociation>,
        files: Vec<File>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            global_files,
            global_chunks,
            chunk_associations,
            files,
        }
    }
}

/// One row-level change. A committed transaction is journaled as the list
/// of mutations it applied; the same type doubles as the undo record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    InsertContent { content: GlobalFile },
    DeleteContent { hash: ContentHash },
    InsertChunk { chunk: GlobalChunk },
    DeleteChunk { hash: ChunkHash },
    InsertAssociation { association: ChunkAssociation },
    DeleteAssociation {
        content_hash: ContentHash,
        chunk_hash: ChunkHash,
    },
    InsertFile { file: File },
    DeleteFile { file_id: Uuid },
}

/// Returns `None` when no snapshot has been written yet.
pub fn load_snapshot(path: &Path) -> StoreResult<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path)
        .map_err(|e| StoreError::Snapshot(format!("read {}: {}", path.display(), e)))?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Snapshot(format!("parse {}: {}", path.display(), e)))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::Snapshot(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    Ok(Some(snapshot))
}

/// Writes to a sibling temp file and renames it over `path`, so readers see
/// either the old snapshot or the new one.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let bytes = serde_json::to_vec(snapshot)
        .map_err(|e| StoreError::Snapshot(format!("serialize: {}", e)))?;

    let temp_path = sibling_path(path, ".tmp");
    fs::write(&temp_path, bytes)
        .map_err(|e| StoreError::Snapshot(format!("write {}: {}", temp_path.display(), e)))?;
    fs::rename(&temp_path, path)
        .map_err(|e| StoreError::Snapshot(format!("rename {}: {}", path.display(), e)))?;

    Ok(())
}

pub fn journal_path_for(snapshot_path: &Path) -> PathBuf {
    sibling_path(snapshot_path, ".journal")
}

/// Appends one committed transaction as a single JSON line and syncs it.
pub fn append_journal(path: &Path, mutations: &[Mutation]) -> StoreResult<()> {
    let mut line = serde_json::to_vec(mutations)
        .map_err(|e| StoreError::Snapshot(format!("serialize journal entry: {}", e)))?;
    line.push(b'\n');

    let mut journal = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::Snapshot(format!("open {}: {}", path.display(), e)))?;
    journal
        .write_all(&line)
        .and_then(|_| journal.sync_data())
        .map_err(|e| StoreError::Snapshot(format!("append {}: {}", path.display(), e)))
}

/// Reads every committed transaction in order. A torn final line (crash
/// mid-append) is dropped; damage anywhere else is an error.
pub fn load_journal(path: &Path) -> StoreResult<Vec<Vec<Mutation>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let text = fs::read_to_string(path)
        .map_err(|e| StoreError::Snapshot(format!("read {}: {}", path.display(), e)))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let mut entries = Vec::with_capacity(lines.len());
    for (number, line) in lines.iter().enumerate() {
        match serde_json::from_str::<Vec<Mutation>>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if number + 1 == lines.len() => {
                warn!(path = %path.display(), error = %e, "dropping torn journal tail");
            }
            Err(e) => {
                return Err(StoreError::Snapshot(format!(
                    "parse {} line {}: {}",
                    path.display(),
                    number + 1,
                    e
                )));
            }
        }
    }

    Ok(entries)
}

pub fn remove_journal(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Snapshot(format!("remove {}: {}", path.display(), e))),
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(suffix);
    path.with_file_name(name)
}
