use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::{ChunkCandidate, Chunker, DocumentParseError, DocumentParser};
use crate::application::services::EmbeddingService;
use crate::domain::entities::{ChunkAssociation, GlobalChunk, GlobalFile};
use crate::domain::repositories::{DedupRepository, StoreError};
use crate::domain::services::IngestionPlan;
use crate::domain::value_objects::{ChunkHash, ContentHash, IngestStatus, IngestionState};

#[derive(Debug, Error)]
pub enum IngestFileError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Parse error: {0}")]
    ParseError(#[from] DocumentParseError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct IngestFileRequest {
    pub user_id: String,
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestFileResponse {
    pub file_id: Uuid,
    pub status: IngestStatus,
    pub content_hash: ContentHash,
    pub chunks_total: usize,
    pub chunks_newly_embedded: usize,
    pub chunks_skipped: usize,
    pub state: IngestionState,
}

/// Tracks one run through the ingestion states.
struct IngestionRun {
    content_hash: ContentHash,
    state: IngestionState,
}

impl IngestionRun {
    fn new(content_hash: ContentHash) -> Self {
        Self {
            content_hash,
            state: IngestionState::CheckingContent,
        }
    }

    fn advance(&mut self, next: IngestionState) {
        if !self.state.can_transition_to(&next) {
            warn!(from = %self.state, to = %next, content_hash = %self.content_hash, "unexpected ingestion transition");
        }
        debug!(from = %self.state, to = %next, content_hash = %self.content_hash, "ingestion state");
        self.state = next;
    }

    fn fail(&mut self, reason: &impl std::fmt::Display) {
        self.advance(IngestionState::Failed(reason.to_string()));
    }
}

/// One chunk occurrence from the chunker, in document order.
struct OrderedChunk {
    hash: ChunkHash,
    candidate: ChunkCandidate,
    index: i32,
}

pub struct IngestFileUseCase {
    repository: Arc<dyn DedupRepository>,
    document_parser: Arc<dyn DocumentParser>,
    chunker: Arc<dyn Chunker>,
    embedding_service: Arc<EmbeddingService>,
    max_attempts: usize,
}

impl IngestFileUseCase {
    pub fn new(
        repository: Arc<dyn DedupRepository>,
        document_parser: Arc<dyn DocumentParser>,
        chunker: Arc<dyn Chunker>,
        embedding_service: Arc<EmbeddingService>,
    ) -> Self {
        Self {
            repository,
            document_parser,
            chunker,
            embedding_service,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn execute(
        &self,
        request: IngestFileRequest,
    ) -> Result<IngestFileResponse, IngestFileError> {
        if request.user_id.trim().is_empty() {
            return Err(IngestFileError::ValidationError(
                "User id cannot be empty".to_string(),
            ));
        }

        if request.filename.trim().is_empty() {
            return Err(IngestFileError::ValidationError(
                "File name cannot be empty".to_string(),
            ));
        }

        if request.data.is_empty() {
            return Err(IngestFileError::ValidationError(
                "File data cannot be empty".to_string(),
            ));
        }

        let content = GlobalFile::from_bytes(&request.data);
        let mut run = IngestionRun::new(content.hash().clone());

        if let Some(response) = self.try_link(&request, &content, &mut run).await? {
            return Ok(response);
        }

        run.advance(IngestionState::Parsing);
        let document = match self
            .document_parser
            .parse(&request.filename, &request.data)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                run.fail(&e);
                return Err(e.into());
            }
        };

        run.advance(IngestionState::Chunking);
        let ordered = order_chunks(self.chunker.chunk(&document));
        let chunks_total = ordered.len();

        let result = self
            .embed_and_persist(&request, content, &ordered, &mut run)
            .await;

        match result {
            Ok((file_id, newly_embedded, skipped)) => {
                run.advance(IngestionState::Done);
                info!(
                    %file_id,
                    user_id = %request.user_id,
                    content_hash = %run.content_hash,
                    chunks_total,
                    newly_embedded,
                    skipped,
                    "file ingested"
                );

                Ok(IngestFileResponse {
                    file_id,
                    status: IngestStatus::Created,
                    content_hash: run.content_hash.clone(),
                    chunks_total,
                    chunks_newly_embedded: newly_embedded,
                    chunks_skipped: skipped,
                    state: run.state,
                })
            }
            Err(e) => {
                run.fail(&e);
                Err(e.into())
            }
        }
    }

    /// `CheckingContent`: known content only needs a new pointer.
    async fn try_link(
        &self,
        request: &IngestFileRequest,
        content: &GlobalFile,
        run: &mut IngestionRun,
    ) -> Result<Option<IngestFileResponse>, IngestFileError> {
        if !self.repository.content_exists(content.hash()).await? {
            return Ok(None);
        }

        let linked = self
            .repository
            .link_existing_content(&request.user_id, &request.filename, content.hash())
            .await?;

        let Some(file) = linked else {
            debug!(content_hash = %content.hash(), "known content was collected, running full pipeline");
            return Ok(None);
        };

        run.advance(IngestionState::Linked);
        info!(
            file_id = %file.id(),
            user_id = %request.user_id,
            content_hash = %content.hash(),
            "file linked to existing content"
        );

        Ok(Some(IngestFileResponse {
            file_id: file.id(),
            status: IngestStatus::Linked,
            content_hash: content.hash().clone(),
            chunks_total: 0,
            chunks_newly_embedded: 0,
            chunks_skipped: 0,
            state: run.state.clone(),
        }))
    }

    /// `CheckingChunkDupes -> EmbeddingNew -> Persisting`, repeated when a
    /// concurrent delete collects a chunk this run meant to reuse.
    async fn embed_and_persist(
        &self,
        request: &IngestFileRequest,
        content: GlobalFile,
        ordered: &[OrderedChunk],
        run: &mut IngestionRun,
    ) -> Result<(Uuid, usize, usize), StoreError> {
        let mut texts: BTreeMap<ChunkHash, &str> = BTreeMap::new();
        for chunk in ordered {
            texts
                .entry(chunk.hash.clone())
                .or_insert(chunk.candidate.text.as_str());
        }
        let unique: BTreeSet<ChunkHash> = texts.keys().cloned().collect();

        let mut embedded: BTreeMap<ChunkHash, GlobalChunk> = BTreeMap::new();
        let mut failed: BTreeMap<ChunkHash, String> = BTreeMap::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            run.advance(IngestionState::CheckingChunkDupes);
            let existing = self.repository.existing_chunk_hashes(&unique).await?;

            run.advance(IngestionState::EmbeddingNew);
            let to_embed: Vec<String> = unique
                .iter()
                .filter(|h| !existing.contains(*h) && !embedded.contains_key(*h) && !failed.contains_key(*h))
                .map(|h| texts[h].to_string())
                .collect();

            let outcome = self.embedding_service.embed_texts(&to_embed).await;
            for chunk in outcome.chunks {
                embedded.insert(chunk.hash().clone(), chunk);
            }
            for failure in outcome.failures {
                failed.insert(failure.chunk_hash, failure.reason);
            }

            run.advance(IngestionState::Persisting);
            let plan = build_plan(request, &content, ordered, &existing, &embedded);
            let newly_embedded = plan.new_chunks.len();
            let skipped = failed.keys().filter(|h| !existing.contains(*h)).count();

            match self.repository.persist_ingestion(&plan).await {
                Ok(outcome) => return Ok((outcome.file.id(), newly_embedded, skipped)),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, content_hash = %content.hash(), "persisting conflicted, re-checking chunks");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn order_chunks(candidates: Vec<ChunkCandidate>) -> Vec<OrderedChunk> {
    candidates
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .enumerate()
        .map(|(index, candidate)| OrderedChunk {
            hash: ChunkHash::from_text(&candidate.text),
            candidate,
            index: index as i32,
        })
        .collect()
}

fn build_plan(
    request: &IngestFileRequest,
    content: &GlobalFile,
    ordered: &[OrderedChunk],
    existing: &BTreeSet<ChunkHash>,
    embedded: &BTreeMap<ChunkHash, GlobalChunk>,
) -> IngestionPlan {
    let mut linked: BTreeSet<&ChunkHash> = BTreeSet::new();
    let mut associations = Vec::new();

    for chunk in ordered {
        let available = existing.contains(&chunk.hash) || embedded.contains_key(&chunk.hash);
        // First occurrence of a repeated text keeps its position.
        if available && linked.insert(&chunk.hash) {
            associations.push(ChunkAssociation::new(
                content.hash().clone(),
                chunk.hash.clone(),
                chunk.index,
                chunk.candidate.metadata.clone(),
            ));
        }
    }

    let new_chunks = embedded
        .iter()
        .filter(|(hash, _)| !existing.contains(*hash) && linked.contains(hash))
        .map(|(_, chunk)| chunk.clone())
        .collect();

    let reused_chunks = linked
        .iter()
        .filter(|hash| existing.contains(**hash))
        .map(|hash| (*hash).clone())
        .collect();

    IngestionPlan {
        user_id: request.user_id.clone(),
        filename: request.filename.clone(),
        content: content.clone(),
        new_chunks,
        reused_chunks,
        associations,
    }
}
