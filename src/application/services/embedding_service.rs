use futures::future::join_all;
use pgvector::Vector;
use std::sync::Arc;
use tracing::warn;

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, EmbeddingProvider, EmbeddingProviderError, EmbeddingRequest,
};
use crate::domain::entities::GlobalChunk;
use crate::domain::value_objects::ChunkHash;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingFailure {
    pub chunk_hash: ChunkHash,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct EmbeddingOutcome {
    pub chunks: Vec<GlobalChunk>,
    pub failures: Vec<EmbeddingFailure>,
}

/// Embeds chunk texts in batches. A failed batch is retried text by text, and
/// only the texts that still fail are reported; nothing here aborts the
/// caller.
pub struct EmbeddingService {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        let dimension = embedding_provider.embedding_dimension();
        Self {
            embedding_provider,
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    pub fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed_texts(&self, texts: &[String]) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome::default();
        let model_name = self.embedding_provider.model_name();

        for batch in texts.chunks(self.batch_size) {
            let request = BatchEmbeddingRequest {
                texts: batch.to_vec(),
                model_name: Some(model_name.clone()),
            };

            match self.embedding_provider.generate_embeddings(request).await {
                Ok(response) if response.embeddings.len() == batch.len() => {
                    for (text, vector) in batch.iter().zip(response.embeddings) {
                        self.accept(text, vector, &mut outcome);
                    }
                }
                Ok(response) => {
                    warn!(
                        expected = batch.len(),
                        received = response.embeddings.len(),
                        "embedding batch size mismatch, retrying chunk by chunk"
                    );
                    self.embed_individually(batch, &model_name, &mut outcome).await;
                }
                Err(e) => {
                    warn!(error = %e, size = batch.len(), "embedding batch failed, retrying chunk by chunk");
                    self.embed_individually(batch, &model_name, &mut outcome).await;
                }
            }
        }

        outcome
    }

    /// Embeds a search query with the same model used for chunks.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingProviderError> {
        if text.trim().is_empty() {
            return Err(EmbeddingProviderError::InvalidInput(
                "query text cannot be empty".to_string(),
            ));
        }

        let response = self
            .embedding_provider
            .generate_embedding(EmbeddingRequest {
                text: text.to_string(),
                model_name: Some(self.embedding_provider.model_name()),
            })
            .await?;

        let vector = response.embedding.to_vec();
        if vector.len() != self.dimension {
            return Err(EmbeddingProviderError::ApiError(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    async fn embed_individually(
        &self,
        batch: &[String],
        model_name: &str,
        outcome: &mut EmbeddingOutcome,
    ) {
        let requests = batch.iter().map(|text| {
            self.embedding_provider.generate_embedding(EmbeddingRequest {
                text: text.clone(),
                model_name: Some(model_name.to_string()),
            })
        });

        for (text, result) in batch.iter().zip(join_all(requests).await) {
            match result {
                Ok(response) => self.accept(text, response.embedding, outcome),
                Err(e) => {
                    let chunk_hash = ChunkHash::from_text(text);
                    warn!(%chunk_hash, error = %e, "chunk skipped: embedding failed");
                    outcome.failures.push(EmbeddingFailure {
                        chunk_hash,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn accept(&self, text: &str, vector: Vector, outcome: &mut EmbeddingOutcome) {
        let received = vector.as_slice().len();
        if received != self.dimension {
            let chunk_hash = ChunkHash::from_text(text);
            warn!(%chunk_hash, expected = self.dimension, received, "chunk skipped: wrong embedding dimension");
            outcome.failures.push(EmbeddingFailure {
                chunk_hash,
                reason: format!("expected {} dimensions, got {}", self.dimension, received),
            });
            return;
        }

        match GlobalChunk::new(text.to_string(), vector) {
            Ok(chunk) => outcome.chunks.push(chunk),
            Err(reason) => outcome.failures.push(EmbeddingFailure {
                chunk_hash: ChunkHash::from_text(text),
                reason,
            }),
        }
    }
}
