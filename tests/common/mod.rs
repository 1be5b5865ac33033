#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use dedup_store::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProviderError, EmbeddingRequest,
    EmbeddingResponse,
};
use dedup_store::application::ports::{Chunker, EmbeddingProvider, ParsedDocument};
use dedup_store::application::ports::chunker::ChunkCandidate;
use dedup_store::application::use_cases::delete_file::{DeleteFileRequest, DeleteFileResponse};
use dedup_store::application::use_cases::ingest_file::{IngestFileRequest, IngestFileResponse};
use dedup_store::config::AppConfig;
use dedup_store::domain::entities::{
    ChunkAssociation, ChunkSearchHit, File, FileChunk, FileDetails, GlobalChunk, GlobalFile,
    StoreStats,
};
use dedup_store::domain::repositories::{
    DedupRepository, RowLock, StoreError, StoreResult, StoreTransaction,
    TransactionalDedupRepository,
};
use dedup_store::domain::services::{DeletionOutcome, IngestionPlan, PersistOutcome};
use dedup_store::domain::value_objects::{ChunkHash, ChunkMetadata, ContentHash};
use dedup_store::infrastructure::AppContainer;
use dedup_store::infrastructure::InMemoryStore;
use dedup_store::infrastructure::external_services::{HashingEmbeddingProvider, PlainTextParser};
use pgvector::Vector;

pub const DIMENSION: usize = 32;

pub fn test_config() -> AppConfig {
    let vars: HashMap<&str, String> = [
        ("STORE_BACKEND", "memory".to_string()),
        ("EMBEDDINGS_PROVIDER", "hashing".to_string()),
        ("EMBEDDING_DIMENSION", DIMENSION.to_string()),
        ("EMBEDDING_BATCH_SIZE", "4".to_string()),
    ]
    .into_iter()
    .collect();

    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config is valid")
}

/// One chunk per non-blank line, trimmed.
pub struct LineChunker;

impl Chunker for LineChunker {
    fn chunk(&self, document: &ParsedDocument) -> Vec<ChunkCandidate> {
        document
            .text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| ChunkCandidate::new(line, ChunkMetadata::default()))
            .collect()
    }
}

/// Hashing embedder that records every text it embedded and refuses the
/// texts listed in `failing`.
pub struct CountingEmbeddingProvider {
    inner: HashingEmbeddingProvider,
    embedded: Mutex<Vec<String>>,
    failing: BTreeSet<String>,
}

impl CountingEmbeddingProvider {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(texts: &[&str]) -> Self {
        Self {
            inner: HashingEmbeddingProvider::new(DIMENSION),
            embedded: Mutex::new(Vec::new()),
            failing: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn embed_count(&self) -> usize {
        self.embedded.lock().unwrap().len()
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbeddingProvider {
    async fn generate_embedding(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EmbeddingProviderError> {
        if self.failing.contains(&request.text) {
            return Err(EmbeddingProviderError::ApiError("refused".to_string()));
        }
        self.embedded.lock().unwrap().push(request.text.clone());
        self.inner.generate_embedding(request).await
    }

    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        if request.texts.iter().any(|t| self.failing.contains(t)) {
            return Err(EmbeddingProviderError::ServiceUnavailable);
        }
        self.embedded
            .lock()
            .unwrap()
            .extend(request.texts.iter().cloned());
        self.inner.generate_embeddings(request).await
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }
}

pub struct TestApp {
    pub container: AppContainer,
    pub provider: Arc<CountingEmbeddingProvider>,
}

impl TestApp {
    pub fn new(repository: Arc<dyn DedupRepository>, provider: CountingEmbeddingProvider) -> Self {
        let provider = Arc::new(provider);
        let container = AppContainer::with_collaborators(
            test_config(),
            repository,
            Arc::new(PlainTextParser::new()),
            Arc::new(LineChunker),
            provider.clone(),
        );
        Self {
            container,
            provider,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(memory_repository(), CountingEmbeddingProvider::new())
    }

    pub fn repository(&self) -> &Arc<dyn DedupRepository> {
        &self.container.repository
    }

    pub async fn ingest(&self, user_id: &str, filename: &str, data: &[u8]) -> IngestFileResponse {
        self.container
            .ingest_file_use_case
            .execute(IngestFileRequest {
                user_id: user_id.to_string(),
                filename: filename.to_string(),
                data: data.to_vec(),
            })
            .await
            .expect("ingest succeeds")
    }

    pub async fn delete(&self, user_id: &str, file_id: Uuid) -> DeleteFileResponse {
        self.container
            .delete_file_use_case
            .execute(DeleteFileRequest {
                file_id,
                user_id: user_id.to_string(),
            })
            .await
            .expect("delete succeeds")
    }

    pub async fn stats(&self) -> StoreStats {
        self.repository().stats().await.expect("stats")
    }

    pub async fn chunk_texts(&self, user_id: &str, file_id: Uuid) -> Vec<String> {
        self.repository()
            .file_chunks(file_id, user_id)
            .await
            .expect("file chunks")
            .into_iter()
            .map(|c| c.content)
            .collect()
    }
}

pub fn memory_repository() -> Arc<dyn DedupRepository> {
    Arc::new(TransactionalDedupRepository::new(Arc::new(InMemoryStore::new())))
}

pub fn embed(text: &str) -> Vec<f32> {
    HashingEmbeddingProvider::new(DIMENSION).embed(text)
}

pub fn chunk(text: &str) -> GlobalChunk {
    GlobalChunk::new(text.to_string(), Vector::from(embed(text))).unwrap()
}

/// Delegates to an inner repository but fails the first `persist_failures`
/// persists and `delete_failures` deletes, with a conflict unless
/// `failing_with` picks another error.
pub struct ConflictingRepository {
    inner: Arc<dyn DedupRepository>,
    persist_failures: AtomicUsize,
    delete_failures: AtomicUsize,
    failure: fn(String) -> StoreError,
    pub persist_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl ConflictingRepository {
    pub fn new(inner: Arc<dyn DedupRepository>, persist_failures: usize, delete_failures: usize) -> Self {
        Self {
            inner,
            persist_failures: AtomicUsize::new(persist_failures),
            delete_failures: AtomicUsize::new(delete_failures),
            failure: StoreError::ConcurrentModification,
            persist_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_with(mut self, failure: fn(String) -> StoreError) -> Self {
        self.failure = failure;
        self
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DedupRepository for ConflictingRepository {
    async fn content_exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.inner.content_exists(hash).await
    }

    async fn upsert_content(&self, content: &GlobalFile) -> StoreResult<bool> {
        self.inner.upsert_content(content).await
    }

    async fn link_existing_content(
        &self,
        user_id: &str,
        filename: &str,
        hash: &ContentHash,
    ) -> StoreResult<Option<File>> {
        self.inner.link_existing_content(user_id, filename, hash).await
    }

    async fn existing_chunk_hashes(
        &self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        self.inner.existing_chunk_hashes(candidates).await
    }

    async fn upsert_chunk(&self, chunk: &GlobalChunk) -> StoreResult<bool> {
        self.inner.upsert_chunk(chunk).await
    }

    async fn link(&self, associations: &[ChunkAssociation]) -> StoreResult<usize> {
        self.inner.link(associations).await
    }

    async fn persist_ingestion(&self, plan: &IngestionPlan) -> StoreResult<PersistOutcome> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.persist_failures) {
            return Err((self.failure)("simulated".to_string()));
        }
        self.inner.persist_ingestion(plan).await
    }

    async fn delete_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<DeletionOutcome> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.delete_failures) {
            return Err((self.failure)("simulated".to_string()));
        }
        self.inner.delete_file(file_id, user_id).await
    }

    async fn find_file(&self, file_id: Uuid, user_id: &str) -> StoreResult<Option<FileDetails>> {
        self.inner.find_file(file_id, user_id).await
    }

    async fn list_files(&self, user_id: &str) -> StoreResult<Vec<File>> {
        self.inner.list_files(user_id).await
    }

    async fn file_chunks(&self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>> {
        self.inner.file_chunks(file_id, user_id).await
    }

    async fn search(
        &self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>> {
        self.inner.search(query, user_id, top_k, file_allowlist).await
    }

    async fn find_global_file(&self, hash: &ContentHash) -> StoreResult<Option<GlobalFile>> {
        self.inner.find_global_file(hash).await
    }

    async fn find_global_chunk(&self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>> {
        self.inner.find_global_chunk(hash).await
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.inner.stats().await
    }
}

/// Forwards to another transaction and runs `after_chunk_insert` on it right
/// after chunks are upserted, standing in for a concurrent writer that
/// commits in that window.
pub struct InterleavedTransaction<'t, F> {
    pub inner: &'t mut dyn StoreTransaction,
    pub after_chunk_insert: F,
}

impl<F> StoreTransaction for InterleavedTransaction<'_, F>
where
    F: FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
{
    fn content_exists(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        self.inner.content_exists(hash)
    }

    fn find_content(
        &mut self,
        hash: &ContentHash,
        lock: RowLock,
    ) -> StoreResult<Option<GlobalFile>> {
        self.inner.find_content(hash, lock)
    }

    fn upsert_content(&mut self, content: &GlobalFile) -> StoreResult<bool> {
        self.inner.upsert_content(content)
    }

    fn delete_content(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        self.inner.delete_content(hash)
    }

    fn existing_chunk_hashes(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
        lock: RowLock,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        self.inner.existing_chunk_hashes(candidates, lock)
    }

    fn upsert_chunks(&mut self, chunks: &[GlobalChunk]) -> StoreResult<usize> {
        let inserted = self.inner.upsert_chunks(chunks)?;
        (self.after_chunk_insert)(&mut *self.inner)?;
        Ok(inserted)
    }

    fn find_chunk(&mut self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>> {
        self.inner.find_chunk(hash)
    }

    fn delete_unreferenced_chunks(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        self.inner.delete_unreferenced_chunks(candidates)
    }

    fn link_chunks(&mut self, associations: &[ChunkAssociation]) -> StoreResult<usize> {
        self.inner.link_chunks(associations)
    }

    fn chunk_hashes_for_content(&mut self, hash: &ContentHash) -> StoreResult<BTreeSet<ChunkHash>> {
        self.inner.chunk_hashes_for_content(hash)
    }

    fn count_associations_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        self.inner.count_associations_for_content(hash)
    }

    fn insert_file(&mut self, file: &File) -> StoreResult<()> {
        self.inner.insert_file(file)
    }

    fn find_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        self.inner.find_file(file_id, user_id)
    }

    fn list_files(&mut self, user_id: &str) -> StoreResult<Vec<File>> {
        self.inner.list_files(user_id)
    }

    fn delete_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        self.inner.delete_file(file_id, user_id)
    }

    fn count_files_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        self.inner.count_files_for_content(hash)
    }

    fn file_chunks(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>> {
        self.inner.file_chunks(file_id, user_id)
    }

    fn search(
        &mut self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>> {
        self.inner.search(query, user_id, top_k, file_allowlist)
    }

    fn stats(&mut self) -> StoreResult<StoreStats> {
        self.inner.stats()
    }
}

/// A plan for `bytes` owned by `user` whose chunks are all brought as new.
pub fn plan_with_new_chunks(user: &str, bytes: &[u8], texts: &[&str]) -> IngestionPlan {
    let content = GlobalFile::from_bytes(bytes);
    let new_chunks: Vec<GlobalChunk> = texts.iter().map(|t| chunk(t)).collect();
    let associations = new_chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            ChunkAssociation::new(
                content.hash().clone(),
                c.hash().clone(),
                i as i32,
                ChunkMetadata::default(),
            )
        })
        .collect();

    IngestionPlan {
        user_id: user.to_string(),
        filename: "doc.txt".to_string(),
        content,
        new_chunks,
        reused_chunks: BTreeSet::new(),
        associations,
    }
}
