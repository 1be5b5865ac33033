use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::ChunkSearchHit;
use crate::domain::repositories::{DedupRepository, StoreError};

pub const MAX_TOP_K: usize = 100;

#[derive(Debug, Error)]
pub enum SearchContentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct SearchContentRequest {
    pub query_embedding: Vec<f32>,
    pub user_id: String,
    pub top_k: usize,
    pub file_id_allowlist: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone)]
pub struct SearchContentResponse {
    pub results: Vec<ChunkSearchHit>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

/// Ranked chunk lookup scoped to the requester's own files.
pub struct SearchContentUseCase {
    repository: Arc<dyn DedupRepository>,
    embedding_dimension: usize,
}

impl SearchContentUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>, embedding_dimension: usize) -> Self {
        Self {
            repository,
            embedding_dimension,
        }
    }

    pub async fn execute(
        &self,
        request: SearchContentRequest,
    ) -> Result<SearchContentResponse, SearchContentError> {
        let start_time = std::time::Instant::now();

        if request.query_embedding.len() != self.embedding_dimension {
            return Err(SearchContentError::ValidationError(format!(
                "Query embedding must have {} dimensions, got {}",
                self.embedding_dimension,
                request.query_embedding.len()
            )));
        }

        if request.top_k > MAX_TOP_K {
            return Err(SearchContentError::ValidationError(format!(
                "top_k must be at most {}",
                MAX_TOP_K
            )));
        }

        let results = if request.user_id.trim().is_empty() {
            Vec::new()
        } else {
            self.repository
                .search(
                    &request.query_embedding,
                    &request.user_id,
                    request.top_k,
                    request.file_id_allowlist.as_deref(),
                )
                .await?
        };

        let search_time_ms = start_time.elapsed().as_millis() as u64;
        debug!(user_id = %request.user_id, hits = results.len(), search_time_ms, "search finished");

        Ok(SearchContentResponse {
            total_results: results.len(),
            results,
            search_time_ms,
        })
    }
}
