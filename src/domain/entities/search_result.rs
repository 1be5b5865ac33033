use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{ChunkHash, ChunkMetadata};

/// A chunk as seen through one of the caller's own files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChunk {
    pub file_id: Uuid,
    pub chunk_hash: ChunkHash,
    pub content: String,
    pub chunk_index: i32,
    pub chunk_metadata: ChunkMetadata,
}

/// A ranked retrieval hit. Ownership comes from `file_id`; chunks carry no
/// owner of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSearchHit {
    pub file_id: Uuid,
    pub filename: String,
    pub chunk_hash: ChunkHash,
    pub content: String,
    pub chunk_index: i32,
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub global_files: i64,
    pub global_chunks: i64,
    pub associations: i64,
    pub files: i64,
}
