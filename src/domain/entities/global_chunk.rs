use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ChunkHash;

/// One unique piece of chunk text together with its embedding.
///
/// There is no constructor without a vector: a chunk row never exists
/// before its embedding does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalChunk {
    hash: ChunkHash,
    content: String,
    embedding: Vector,
    created_at: DateTime<Utc>,
}

impl GlobalChunk {
    pub fn new(content: String, embedding: Vector) -> Result<Self, String> {
        if embedding.as_slice().is_empty() {
            return Err("Chunk embedding must not be empty".to_string());
        }

        Ok(Self {
            hash: ChunkHash::from_text(&content),
            content,
            embedding,
            created_at: Utc::now(),
        })
    }

    pub fn restore(
        hash: ChunkHash,
        content: String,
        embedding: Vector,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            hash,
            content,
            embedding,
            created_at,
        }
    }

    pub fn hash(&self) -> &ChunkHash {
        &self.hash
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn embedding(&self) -> &Vector {
        &self.embedding
    }

    pub fn dimension(&self) -> usize {
        self.embedding.as_slice().len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cosine_similarity(&self, query: &[f32]) -> f32 {
        cosine_similarity(self.embedding.as_slice(), query)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
