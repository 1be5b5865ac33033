use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ChunkHash, ChunkMetadata, ContentHash};

/// Join row between a piece of content and a chunk it contains.
/// Keyed by `(global_file_hash, chunk_hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAssociation {
    global_file_hash: ContentHash,
    chunk_hash: ChunkHash,
    chunk_index: i32,
    chunk_metadata: ChunkMetadata,
}

impl ChunkAssociation {
    pub fn new(
        global_file_hash: ContentHash,
        chunk_hash: ChunkHash,
        chunk_index: i32,
        chunk_metadata: ChunkMetadata,
    ) -> Self {
        Self {
            global_file_hash,
            chunk_hash,
            chunk_index,
            chunk_metadata,
        }
    }

    pub fn global_file_hash(&self) -> &ContentHash {
        &self.global_file_hash
    }

    pub fn chunk_hash(&self) -> &ChunkHash {
        &self.chunk_hash
    }

    pub fn chunk_index(&self) -> i32 {
        self.chunk_index
    }

    pub fn chunk_metadata(&self) -> &ChunkMetadata {
        &self.chunk_metadata
    }

    pub fn key(&self) -> (&ContentHash, &ChunkHash) {
        (&self.global_file_hash, &self.chunk_hash)
    }
}
