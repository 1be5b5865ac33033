use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::use_cases::search_content::SearchContentResponse;
use crate::domain::entities::ChunkSearchHit;
use crate::domain::value_objects::ChunkMetadata;

/// Either `query_embedding` or `query` (text, embedded server-side) is
/// required; the embedding wins when both are present.
#[derive(Debug, Deserialize)]
pub struct SearchRequestDto {
    pub query: Option<String>,
    pub query_embedding: Option<Vec<f32>>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    pub file_ids: Option<Vec<Uuid>>,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct SearchHitDto {
    pub file_id: Uuid,
    pub filename: String,
    pub chunk_hash: String,
    pub content: String,
    pub chunk_index: i32,
    pub metadata: ChunkMetadata,
    pub similarity_score: f32,
}

impl From<ChunkSearchHit> for SearchHitDto {
    fn from(hit: ChunkSearchHit) -> Self {
        Self {
            file_id: hit.file_id,
            filename: hit.filename,
            chunk_hash: hit.chunk_hash.to_string(),
            content: hit.content,
            chunk_index: hit.chunk_index,
            metadata: hit.chunk_metadata,
            similarity_score: hit.similarity_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponseDto {
    pub results: Vec<SearchHitDto>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

impl From<SearchContentResponse> for SearchResponseDto {
    fn from(response: SearchContentResponse) -> Self {
        Self {
            results: response.results.into_iter().map(SearchHitDto::from).collect(),
            total_results: response.total_results,
            search_time_ms: response.search_time_ms,
        }
    }
}
