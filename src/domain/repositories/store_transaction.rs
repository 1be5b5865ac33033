use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    ChunkAssociation, ChunkSearchHit, File, FileChunk, GlobalChunk, GlobalFile, StoreStats,
};
use crate::domain::value_objects::{ChunkHash, ContentHash};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection error: {0}")]
    Connection(String),
    /// A conflicting transaction won; the whole unit can be retried.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    /// The store reached a state the orphan collector must never produce.
    #[error("Referential integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row lock taken while reading, so a delete-side recount and a concurrent
/// re-ingest of the same content serialise on the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,
    /// Held by writers that are about to reference the row.
    KeyShare,
    /// Held by the orphan collector before it recounts references.
    Update,
}

/// Primitive operations available inside one open transaction.
///
/// Implementations are connection-scoped: nothing here commits. Every create
/// is insert-if-absent, so "already exists" is never an error.
pub trait StoreTransaction {
    fn content_exists(&mut self, hash: &ContentHash) -> StoreResult<bool>;
    fn find_content(&mut self, hash: &ContentHash, lock: RowLock)
    -> StoreResult<Option<GlobalFile>>;
    /// Returns whether a row was inserted.
    fn upsert_content(&mut self, content: &GlobalFile) -> StoreResult<bool>;
    /// Removes the content row together with every association it owns.
    fn delete_content(&mut self, hash: &ContentHash) -> StoreResult<bool>;

    fn existing_chunk_hashes(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
        lock: RowLock,
    ) -> StoreResult<BTreeSet<ChunkHash>>;
    /// Returns the number of rows inserted.
    fn upsert_chunks(&mut self, chunks: &[GlobalChunk]) -> StoreResult<usize>;
    fn find_chunk(&mut self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>>;
    /// Deletes the candidates no association references any more and
    /// returns the hashes actually removed.
    fn delete_unreferenced_chunks(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>>;

    /// Insert-if-absent on `(global_file_hash, chunk_hash)`; returns the
    /// number of new rows.
    fn link_chunks(&mut self, associations: &[ChunkAssociation]) -> StoreResult<usize>;
    fn chunk_hashes_for_content(&mut self, hash: &ContentHash) -> StoreResult<BTreeSet<ChunkHash>>;
    fn count_associations_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64>;

    fn insert_file(&mut self, file: &File) -> StoreResult<()>;
    fn find_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>>;
    fn list_files(&mut self, user_id: &str) -> StoreResult<Vec<File>>;
    /// Deletes the pointer only if `user_id` owns it; returns the removed row.
    fn delete_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>>;
    fn count_files_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64>;

    fn file_chunks(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>>;
    fn search(
        &mut self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>>;
    fn stats(&mut self) -> StoreResult<StoreStats>;
}

/// Opens a transaction, hands it to `work`, commits on `Ok` and rolls back
/// on `Err`.
pub trait TransactionRunner: Send + Sync {
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()>;

    /// Read-only variant. Backends may skip write bookkeeping.
    fn run_read_only(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        self.run_in_transaction(work)
    }
}
