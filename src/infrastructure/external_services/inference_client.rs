use async_trait::async_trait;
use pgvector::Vector;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
    EmbeddingRequest, EmbeddingResponse,
};

#[derive(Serialize)]
pub struct EmbeddingsRequest {
    pub text: TextInput,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub success: bool,
    pub embeddings: Vec<Vector>,
    #[serde(default)]
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsClientConfig {
    pub service_url: String,
    pub model_name: String,
    pub dimension: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub backoff_factor: f64,
}

impl Default for EmbeddingsClientConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8080/embed".to_string(),
            model_name: "default".to_string(),
            dimension: 1536,
            max_retries: 3,
            timeout_secs: 30,
            backoff_factor: 1.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingsError {
    #[error("request failed: {0}")]
    RequestError(String),
    #[error("unexpected response: {0}")]
    ParseError(String),
    #[error("rate limited")]
    RateLimited,
    #[error("service returned {0}")]
    ServiceError(StatusCode),
}

impl From<EmbeddingsError> for EmbeddingProviderError {
    fn from(error: EmbeddingsError) -> Self {
        match error {
            EmbeddingsError::RequestError(msg) => EmbeddingProviderError::NetworkError(msg),
            EmbeddingsError::ParseError(msg) => EmbeddingProviderError::ApiError(msg),
            EmbeddingsError::RateLimited => EmbeddingProviderError::RateLimitExceeded,
            EmbeddingsError::ServiceError(status) if status.is_server_error() => {
                EmbeddingProviderError::ServiceUnavailable
            }
            EmbeddingsError::ServiceError(status) => {
                EmbeddingProviderError::ApiError(format!("status {}", status))
            }
        }
    }
}

/// HTTP client for the embedding service, retrying with exponential backoff.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    config: EmbeddingsClientConfig,
}

impl InferenceClient {
    pub fn new(config: EmbeddingsClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EmbeddingsClientConfig {
        &self.config
    }

    pub async fn get_embedding(&self, text: &str) -> Result<EmbeddingsResponse, EmbeddingsError> {
        self.send_request(EmbeddingsRequest {
            text: TextInput::Single(text.to_string()),
        })
        .await
    }

    pub async fn get_embeddings(&self, texts: &[String]) -> Result<EmbeddingsResponse, EmbeddingsError> {
        self.send_request(EmbeddingsRequest {
            text: TextInput::Multiple(texts.to_vec()),
        })
        .await
    }

    async fn send_request(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, EmbeddingsError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.execute_request(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempts > self.config.max_retries => return Err(e),
                Err(EmbeddingsError::ParseError(msg)) => {
                    return Err(EmbeddingsError::ParseError(msg));
                }
                Err(e) => {
                    let backoff_time = Duration::from_millis(
                        (self.config.backoff_factor.powi(attempts as i32 - 1) * 1000.0) as u64,
                    );
                    warn!(attempts, error = %e, backoff_ms = backoff_time.as_millis() as u64, "embedding request failed");
                    tokio::time::sleep(backoff_time).await;
                }
            }
        }
    }

    async fn execute_request(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, EmbeddingsError> {
        let response = self
            .client
            .post(&self.config.service_url)
            .json(request)
            .send()
            .await
            .map_err(|e| EmbeddingsError::RequestError(e.without_url().to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(EmbeddingsError::RateLimited),
            status if !status.is_success() => return Err(EmbeddingsError::ServiceError(status)),
            _ => {}
        }

        let body = response
            .json::<EmbeddingsResponse>()
            .await
            .map_err(|e| EmbeddingsError::ParseError(e.to_string()))?;

        if !body.success {
            return Err(EmbeddingsError::ParseError(
                "service reported an unsuccessful embedding".to_string(),
            ));
        }

        debug!(vectors = body.embeddings.len(), shape = ?body.shape, "embeddings received");
        Ok(body)
    }
}

pub struct InferenceEmbeddingProvider {
    client: InferenceClient,
}

impl InferenceEmbeddingProvider {
    pub fn new(client: InferenceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmbeddingProvider for InferenceEmbeddingProvider {
    async fn generate_embedding(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EmbeddingProviderError> {
        if request.text.is_empty() {
            return Err(EmbeddingProviderError::InvalidInput("empty text".to_string()));
        }

        let response = self.client.get_embedding(&request.text).await?;
        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingProviderError::ApiError("No embeddings returned".to_string()))?;

        Ok(EmbeddingResponse {
            embedding,
            model_name: request.model_name.unwrap_or_else(|| self.model_name()),
        })
    }

    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        let response = self.client.get_embeddings(&request.texts).await?;

        Ok(BatchEmbeddingResponse {
            embeddings: response.embeddings,
            model_name: request.model_name.unwrap_or_else(|| self.model_name()),
        })
    }

    fn model_name(&self) -> String {
        self.client.config().model_name.clone()
    }

    fn embedding_dimension(&self) -> usize {
        self.client.config().dimension
    }
}
