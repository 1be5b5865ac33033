use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::{
    ChunkAssociation, ChunkSearchHit, File, FileChunk, FileDetails, GlobalChunk, GlobalFile,
    StoreStats,
};
use crate::domain::repositories::store_transaction::{
    RowLock, StoreError, StoreResult, StoreTransaction, TransactionRunner,
};
use crate::domain::services::{self, DeletionOutcome, IngestionPlan, PersistOutcome};
use crate::domain::value_objects::{ChunkHash, ContentHash};

/// Store API used by the orchestrators. Every method is one atomic unit.
#[async_trait]
pub trait DedupRepository: Send + Sync {
    async fn content_exists(&self, hash: &ContentHash) -> StoreResult<bool>;
    async fn upsert_content(&self, content: &GlobalFile) -> StoreResult<bool>;
    async fn link_existing_content(
        &self,
        user_id: &str,
        filename: &str,
        hash: &ContentHash,
    ) -> StoreResult<Option<File>>;

    async fn existing_chunk_hashes(
        &self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>>;
    async fn upsert_chunk(&self, chunk: &GlobalChunk) -> StoreResult<bool>;

    async fn link(&self, associations: &[ChunkAssociation]) -> StoreResult<usize>;

    async fn persist_ingestion(&self, plan: &IngestionPlan) -> StoreResult<PersistOutcome>;
    async fn delete_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<DeletionOutcome>;

    async fn find_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<Option<FileDetails>>;
    async fn list_files(&self, user_id: &str) -> StoreResult<Vec<File>>;
    async fn file_chunks(&self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>>;
    async fn search(
        &self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>>;

    async fn find_global_file(&self, hash: &ContentHash) -> StoreResult<Option<GlobalFile>>;
    async fn find_global_chunk(&self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>>;
    async fn stats(&self) -> StoreResult<StoreStats>;
}

/// `DedupRepository` over any backend that can open transactions.
pub struct TransactionalDedupRepository {
    runner: Arc<dyn TransactionRunner>,
}

impl TransactionalDedupRepository {
    pub fn new(runner: Arc<dyn TransactionRunner>) -> Self {
        Self { runner }
    }

    fn write<T>(
        &self,
        mut work: impl FnMut(&mut dyn StoreTransaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut output = None;
        self.runner.run_in_transaction(&mut |tx| {
            output = Some(work(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| StoreError::Database("transaction produced no result".to_string()))
    }

    fn read<T>(
        &self,
        mut work: impl FnMut(&mut dyn StoreTransaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut output = None;
        self.runner.run_read_only(&mut |tx| {
            output = Some(work(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| StoreError::Database("transaction produced no result".to_string()))
    }
}

#[async_trait]
impl DedupRepository for TransactionalDedupRepository {
    async fn content_exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.read(|tx| tx.content_exists(hash))
    }

    async fn upsert_content(&self, content: &GlobalFile) -> StoreResult<bool> {
        self.write(|tx| tx.upsert_content(content))
    }

    async fn link_existing_content(
        &self,
        user_id: &str,
        filename: &str,
        hash: &ContentHash,
    ) -> StoreResult<Option<File>> {
        self.write(|tx| services::link_existing_content(tx, user_id, filename, hash))
    }

    async fn existing_chunk_hashes(
        &self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        if candidates.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.read(|tx| tx.existing_chunk_hashes(candidates, RowLock::None))
    }

    async fn upsert_chunk(&self, chunk: &GlobalChunk) -> StoreResult<bool> {
        self.write(|tx| tx.upsert_chunks(std::slice::from_ref(chunk)).map(|n| n > 0))
    }

    async fn link(&self, associations: &[ChunkAssociation]) -> StoreResult<usize> {
        if associations.is_empty() {
            return Ok(0);
        }
        self.write(|tx| tx.link_chunks(associations))
    }

    async fn persist_ingestion(&self, plan: &IngestionPlan) -> StoreResult<PersistOutcome> {
        self.write(|tx| services::persist_ingestion(tx, plan))
    }

    async fn delete_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<DeletionOutcome> {
        self.write(|tx| services::delete_and_collect(tx, file_id, user_id))
    }

    async fn find_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<Option<FileDetails>> {
        self.read(|tx| {
            let Some(file) = tx.find_file(file_id, user_id)? else {
                return Ok(None);
            };

            let content = tx.find_content(file.content_hash(), RowLock::None)?.ok_or_else(|| {
                StoreError::IntegrityViolation(format!(
                    "file {} references missing content {}",
                    file.id(),
                    file.content_hash()
                ))
            })?;
            let chunk_count = tx.count_associations_for_content(content.hash())?;

            Ok(Some(FileDetails {
                file,
                size: content.size(),
                chunk_count,
            }))
        })
    }

    async fn list_files(&self, user_id: &str) -> StoreResult<Vec<File>> {
        self.read(|tx| tx.list_files(user_id))
    }

    async fn file_chunks(&self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>> {
        self.read(|tx| tx.file_chunks(file_id, user_id))
    }

    async fn search(
        &self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>> {
        if top_k == 0 || matches!(file_allowlist, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }
        self.read(|tx| tx.search(query, user_id, top_k, file_allowlist))
    }

    async fn find_global_file(&self, hash: &ContentHash) -> StoreResult<Option<GlobalFile>> {
        self.read(|tx| tx.find_content(hash, RowLock::None))
    }

    async fn find_global_chunk(&self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>> {
        self.read(|tx| tx.find_chunk(hash))
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.read(|tx| tx.stats())
    }
}
