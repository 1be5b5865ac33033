use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{
    ChunkAssociation, ChunkSearchHit, File, FileChunk, GlobalChunk, GlobalFile, StoreStats,
};
use crate::domain::repositories::{
    RowLock, StoreError, StoreResult, StoreTransaction, TransactionRunner,
};
use crate::domain::value_objects::{ChunkHash, ContentHash};
use crate::infrastructure::memory::snapshot::{
    Mutation, Snapshot, append_journal, journal_path_for, load_journal, load_snapshot,
    remove_journal, write_snapshot,
};

/// Tables plus the secondary indexes that keep every write bounded by the
/// rows it touches.
#[derive(Debug, Default)]
struct MemoryState {
    global_files: BTreeMap<ContentHash, GlobalFile>,
    global_chunks: BTreeMap<ChunkHash, GlobalChunk>,
    associations: BTreeMap<ContentHash, BTreeMap<ChunkHash, ChunkAssociation>>,
    files: BTreeMap<Uuid, File>,

    /// Number of associations referencing each chunk.
    chunk_refs: BTreeMap<ChunkHash, usize>,
    content_files: BTreeMap<ContentHash, BTreeSet<Uuid>>,
    user_files: BTreeMap<String, BTreeSet<Uuid>>,
    association_count: usize,
}

impl MemoryState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = MemoryState::default();

        let mutations = snapshot
            .global_files
            .into_iter()
            .map(|content| Mutation::InsertContent { content })
            .chain(
                snapshot
                    .global_chunks
                    .into_iter()
                    .map(|chunk| Mutation::InsertChunk { chunk }),
            )
            .chain(
                snapshot
                    .chunk_associations
                    .into_iter()
                    .map(|association| Mutation::InsertAssociation { association }),
            )
            .chain(snapshot.files.into_iter().map(|file| Mutation::InsertFile { file }));

        for mutation in mutations {
            state.apply(mutation);
        }
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.global_files.values().cloned().collect(),
            self.global_chunks.values().cloned().collect(),
            self.associations
                .values()
                .flat_map(|links| links.values().cloned())
                .collect(),
            self.files.values().cloned().collect(),
        )
    }

    /// Applies one mutation and returns its inverse, or `None` when it
    /// changed nothing. Indexes are maintained here and nowhere else.
    fn apply(&mut self, mutation: Mutation) -> Option<Mutation> {
        match mutation {
            Mutation::InsertContent { content } => {
                if self.global_files.contains_key(content.hash()) {
                    return None;
                }
                let hash = content.hash().clone();
                self.global_files.insert(hash.clone(), content);
                Some(Mutation::DeleteContent { hash })
            }
            Mutation::DeleteContent { hash } => {
                // Associations are removed first, one mutation each.
                let content = self.global_files.remove(&hash)?;
                Some(Mutation::InsertContent { content })
            }
            Mutation::InsertChunk { chunk } => {
                if self.global_chunks.contains_key(chunk.hash()) {
                    return None;
                }
                let hash = chunk.hash().clone();
                self.global_chunks.insert(hash.clone(), chunk);
                Some(Mutation::DeleteChunk { hash })
            }
            Mutation::DeleteChunk { hash } => {
                let chunk = self.global_chunks.remove(&hash)?;
                Some(Mutation::InsertChunk { chunk })
            }
            Mutation::InsertAssociation { association } => {
                let (content_hash, chunk_hash) = association.key();
                let (content_hash, chunk_hash) = (content_hash.clone(), chunk_hash.clone());
                let links = self.associations.entry(content_hash.clone()).or_default();
                if links.contains_key(&chunk_hash) {
                    return None;
                }
                links.insert(chunk_hash.clone(), association);
                *self.chunk_refs.entry(chunk_hash.clone()).or_default() += 1;
                self.association_count += 1;
                Some(Mutation::DeleteAssociation {
                    content_hash,
                    chunk_hash,
                })
            }
            Mutation::DeleteAssociation {
                content_hash,
                chunk_hash,
            } => {
                let links = self.associations.get_mut(&content_hash)?;
                let association = links.remove(&chunk_hash)?;
                if links.is_empty() {
                    self.associations.remove(&content_hash);
                }
                if let Some(refs) = self.chunk_refs.get_mut(&chunk_hash) {
                    *refs -= 1;
                    if *refs == 0 {
                        self.chunk_refs.remove(&chunk_hash);
                    }
                }
                self.association_count -= 1;
                Some(Mutation::InsertAssociation { association })
            }
            Mutation::InsertFile { file } => {
                if self.files.contains_key(&file.id()) {
                    return None;
                }
                let file_id = file.id();
                self.content_files
                    .entry(file.content_hash().clone())
                    .or_default()
                    .insert(file_id);
                self.user_files
                    .entry(file.user_id().to_string())
                    .or_default()
                    .insert(file_id);
                self.files.insert(file_id, file);
                Some(Mutation::DeleteFile { file_id })
            }
            Mutation::DeleteFile { file_id } => {
                let file = self.files.remove(&file_id)?;
                remove_from_index(&mut self.content_files, file.content_hash(), file_id);
                remove_from_index(&mut self.user_files, file.user_id(), file_id);
                Some(Mutation::InsertFile { file })
            }
        }
    }

    fn is_chunk_referenced(&self, hash: &ChunkHash) -> bool {
        self.chunk_refs.contains_key(hash)
    }

    fn files_of_user<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a File> {
        self.user_files
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.files.get(id))
    }

    fn owned_file(&self, file_id: Uuid, user_id: &str) -> Option<&File> {
        self.files.get(&file_id).filter(|f| f.is_owned_by(user_id))
    }
}

fn remove_from_index<K, Q>(index: &mut BTreeMap<K, BTreeSet<Uuid>>, key: &Q, file_id: Uuid)
where
    K: Ord + std::borrow::Borrow<Q>,
    Q: Ord + ?Sized,
{
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&file_id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Process-local backend for development and tests.
///
/// A write transaction mutates the shared state in place under one mutex and
/// records an undo entry per change; on `Err` the undo log is replayed in
/// reverse. With a snapshot path, each commit appends only its own mutations
/// to a journal next to the snapshot. Opening the store replays the journal
/// and checkpoints it into a fresh snapshot.
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    snapshot_path: Option<PathBuf>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by `path`, reloading the snapshot and replaying
    /// any journaled commits made after it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = load_snapshot(&path)?
            .map(MemoryState::from_snapshot)
            .unwrap_or_default();

        let journal = load_journal(&journal_path_for(&path))?;
        let replayed = journal.len();
        for entry in journal {
            for mutation in entry {
                state.apply(mutation);
            }
        }

        info!(
            path = %path.display(),
            files = state.files.len(),
            chunks = state.global_chunks.len(),
            replayed,
            "memory store opened"
        );

        let store = Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        };
        if replayed > 0 {
            store.checkpoint()?;
        }
        Ok(store)
    }

    /// Folds the journal into a new snapshot. A no-op without a snapshot path.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let guard = self.lock()?;
        write_snapshot(path, &guard.to_snapshot())?;
        remove_journal(&journal_path_for(path))?;
        debug!(path = %path.display(), "memory store checkpointed");
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("memory store mutex poisoned".to_string()))
    }
}

impl TransactionRunner for InMemoryStore {
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let mut tx = MemoryTransaction::new(&mut guard, false);

        let result = match work(&mut tx) {
            Ok(()) => tx.journal(self.snapshot_path.as_deref()),
            Err(e) => Err(e),
        };

        if result.is_err() {
            tx.rollback();
        }
        result
    }

    fn run_read_only(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut guard = self.lock()?;
        work(&mut MemoryTransaction::new(&mut guard, true))
    }
}

struct MemoryTransaction<'s> {
    state: &'s mut MemoryState,
    read_only: bool,
    applied: Vec<Mutation>,
    undo: Vec<Mutation>,
}

impl<'s> MemoryTransaction<'s> {
    fn new(state: &'s mut MemoryState, read_only: bool) -> Self {
        Self {
            state,
            read_only,
            applied: Vec::new(),
            undo: Vec::new(),
        }
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::Database(
                "write attempted in a read-only transaction".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns whether the mutation changed anything.
    fn apply(&mut self, mutation: Mutation) -> bool {
        let redo = mutation.clone();
        match self.state.apply(mutation) {
            Some(inverse) => {
                self.applied.push(redo);
                self.undo.push(inverse);
                true
            }
            None => false,
        }
    }

    fn journal(&self, snapshot_path: Option<&Path>) -> StoreResult<()> {
        match snapshot_path {
            Some(path) if !self.applied.is_empty() => {
                append_journal(&journal_path_for(path), &self.applied)
            }
            _ => Ok(()),
        }
    }

    fn rollback(self) {
        let undone = self.undo.len();
        for mutation in self.undo.into_iter().rev() {
            if self.state.apply(mutation).is_none() {
                warn!("undo entry changed nothing");
            }
        }
        debug!(undone, "memory transaction rolled back");
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn content_exists(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.state.global_files.contains_key(hash))
    }

    fn find_content(
        &mut self,
        hash: &ContentHash,
        _lock: RowLock,
    ) -> StoreResult<Option<GlobalFile>> {
        Ok(self.state.global_files.get(hash).cloned())
    }

    fn upsert_content(&mut self, content: &GlobalFile) -> StoreResult<bool> {
        self.ensure_writable()?;
        Ok(self.apply(Mutation::InsertContent {
            content: content.clone(),
        }))
    }

    fn delete_content(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        self.ensure_writable()?;

        if self.state.content_files.contains_key(hash) {
            return Err(StoreError::IntegrityViolation(format!(
                "content {} is still referenced by a file",
                hash
            )));
        }
        if !self.state.global_files.contains_key(hash) {
            return Ok(false);
        }

        // Cascade one association at a time so each gets an undo entry.
        let linked: Vec<ChunkHash> = self
            .state
            .associations
            .get(hash)
            .map(|links| links.keys().cloned().collect())
            .unwrap_or_default();
        for chunk_hash in linked {
            self.apply(Mutation::DeleteAssociation {
                content_hash: hash.clone(),
                chunk_hash,
            });
        }

        Ok(self.apply(Mutation::DeleteContent { hash: hash.clone() }))
    }

    fn existing_chunk_hashes(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
        _lock: RowLock,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        Ok(candidates
            .iter()
            .filter(|hash| self.state.global_chunks.contains_key(*hash))
            .cloned()
            .collect())
    }

    fn upsert_chunks(&mut self, chunks: &[GlobalChunk]) -> StoreResult<usize> {
        self.ensure_writable()?;

        let mut inserted = 0;
        for chunk in chunks {
            if self.apply(Mutation::InsertChunk {
                chunk: chunk.clone(),
            }) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn find_chunk(&mut self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>> {
        Ok(self.state.global_chunks.get(hash).cloned())
    }

    fn delete_unreferenced_chunks(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        self.ensure_writable()?;

        let orphans: BTreeSet<ChunkHash> = candidates
            .iter()
            .filter(|hash| {
                self.state.global_chunks.contains_key(*hash) && !self.state.is_chunk_referenced(hash)
            })
            .cloned()
            .collect();

        for hash in &orphans {
            self.apply(Mutation::DeleteChunk { hash: hash.clone() });
        }

        debug!(candidates = candidates.len(), removed = orphans.len(), "orphan chunks collected");
        Ok(orphans)
    }

    fn link_chunks(&mut self, associations: &[ChunkAssociation]) -> StoreResult<usize> {
        self.ensure_writable()?;

        let mut linked = 0;
        for association in associations {
            let (file_hash, chunk_hash) = association.key();

            if !self.state.global_files.contains_key(file_hash) {
                return Err(StoreError::IntegrityViolation(format!(
                    "association references missing content {}",
                    file_hash
                )));
            }
            if !self.state.global_chunks.contains_key(chunk_hash) {
                return Err(StoreError::IntegrityViolation(format!(
                    "association references missing chunk {}",
                    chunk_hash
                )));
            }

            if self.apply(Mutation::InsertAssociation {
                association: association.clone(),
            }) {
                linked += 1;
            }
        }
        Ok(linked)
    }

    fn chunk_hashes_for_content(&mut self, hash: &ContentHash) -> StoreResult<BTreeSet<ChunkHash>> {
        Ok(self
            .state
            .associations
            .get(hash)
            .map(|links| links.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn count_associations_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        Ok(self
            .state
            .associations
            .get(hash)
            .map_or(0, |links| links.len() as i64))
    }

    fn insert_file(&mut self, file: &File) -> StoreResult<()> {
        self.ensure_writable()?;

        if !self.state.global_files.contains_key(file.content_hash()) {
            return Err(StoreError::IntegrityViolation(format!(
                "file {} references missing content {}",
                file.id(),
                file.content_hash()
            )));
        }
        if !self.apply(Mutation::InsertFile { file: file.clone() }) {
            return Err(StoreError::Database(format!("duplicate file id {}", file.id())));
        }
        Ok(())
    }

    fn find_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        Ok(self.state.owned_file(file_id, user_id).cloned())
    }

    fn list_files(&mut self, user_id: &str) -> StoreResult<Vec<File>> {
        let mut files: Vec<File> = self.state.files_of_user(user_id).cloned().collect();

        files.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(files)
    }

    fn delete_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        self.ensure_writable()?;

        let Some(file) = self.state.owned_file(file_id, user_id).cloned() else {
            return Ok(None);
        };
        self.apply(Mutation::DeleteFile { file_id });
        Ok(Some(file))
    }

    fn count_files_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        Ok(self
            .state
            .content_files
            .get(hash)
            .map_or(0, |ids| ids.len() as i64))
    }

    fn file_chunks(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>> {
        let Some(file) = self.state.owned_file(file_id, user_id) else {
            return Ok(Vec::new());
        };

        let mut chunks = Vec::new();
        if let Some(links) = self.state.associations.get(file.content_hash()) {
            for association in links.values() {
                let chunk = self
                    .state
                    .global_chunks
                    .get(association.chunk_hash())
                    .ok_or_else(|| {
                        StoreError::IntegrityViolation(format!(
                            "association references missing chunk {}",
                            association.chunk_hash()
                        ))
                    })?;

                chunks.push(FileChunk {
                    file_id,
                    chunk_hash: chunk.hash().clone(),
                    content: chunk.content().to_string(),
                    chunk_index: association.chunk_index(),
                    chunk_metadata: association.chunk_metadata().clone(),
                });
            }
        }

        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    fn search(
        &mut self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>> {
        let mut hits = Vec::new();

        for file in self.state.files_of_user(user_id) {
            if let Some(ids) = file_allowlist {
                if !ids.contains(&file.id()) {
                    continue;
                }
            }

            let Some(links) = self.state.associations.get(file.content_hash()) else {
                continue;
            };

            for association in links.values() {
                let Some(chunk) = self.state.global_chunks.get(association.chunk_hash()) else {
                    continue;
                };

                hits.push(ChunkSearchHit {
                    file_id: file.id(),
                    filename: file.filename().to_string(),
                    chunk_hash: chunk.hash().clone(),
                    content: chunk.content().to_string(),
                    chunk_index: association.chunk_index(),
                    chunk_metadata: association.chunk_metadata().clone(),
                    similarity_score: chunk.cosine_similarity(query),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then_with(|| a.file_id.cmp(&b.file_id))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn stats(&mut self) -> StoreResult<StoreStats> {
        Ok(StoreStats {
            global_files: self.state.global_files.len() as i64,
            global_chunks: self.state.global_chunks.len() as i64,
            associations: self.state.association_count as i64,
            files: self.state.files.len() as i64,
        })
    }
}
