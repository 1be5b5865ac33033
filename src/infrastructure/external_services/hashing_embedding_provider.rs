use async_trait::async_trait;
use pgvector::Vector;
use sha2::{Digest, Sha256};

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
    EmbeddingRequest, EmbeddingResponse,
};

const MODEL_NAME: &str = "feature-hashing";

/// Offline embedder: a normalised bag of lowercase words, hashed into a
/// fixed number of buckets. Deterministic, so texts sharing words land close
/// together and identical texts get identical vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_be_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn generate_embedding(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EmbeddingProviderError> {
        Ok(EmbeddingResponse {
            embedding: Vector::from(self.embed(&request.text)),
            model_name: request.model_name.unwrap_or_else(|| self.model_name()),
        })
    }

    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        Ok(BatchEmbeddingResponse {
            embeddings: request
                .texts
                .iter()
                .map(|text| Vector::from(self.embed(text)))
                .collect(),
            model_name: request.model_name.unwrap_or_else(|| self.model_name()),
        })
    }

    fn model_name(&self) -> String {
        MODEL_NAME.to_string()
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::global_chunk::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalised() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("Quarterly revenue grew");
        let b = provider.embed("quarterly REVENUE grew");

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_related_texts_score_higher() {
        let provider = HashingEmbeddingProvider::new(256);
        let query = provider.embed("invoice payment terms");
        let close = provider.embed("payment terms for every invoice");
        let far = provider.embed("mountain hiking trail");

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_text_without_words_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8);
        assert!(provider.embed("  --  ").iter().all(|v| *v == 0.0));
    }
}
