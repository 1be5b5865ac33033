use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{FileChunk, FileDetails};
use crate::domain::repositories::{DedupRepository, StoreError};

#[derive(Debug, Error)]
pub enum GetFileError {
    /// Also returned for files owned by someone else.
    #[error("File not found: {0}")]
    FileNotFound(Uuid),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct GetFileRequest {
    pub file_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct GetFileResponse {
    pub details: FileDetails,
}

pub struct GetFileUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl GetFileUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, request: GetFileRequest) -> Result<GetFileResponse, GetFileError> {
        let details = self
            .repository
            .find_file(request.file_id, &request.user_id)
            .await?
            .ok_or(GetFileError::FileNotFound(request.file_id))?;

        Ok(GetFileResponse { details })
    }
}

#[derive(Debug, Clone)]
pub struct GetFileChunksResponse {
    pub file_id: Uuid,
    pub chunks: Vec<FileChunk>,
}

pub struct GetFileChunksUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl GetFileChunksUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        request: GetFileRequest,
    ) -> Result<GetFileChunksResponse, GetFileError> {
        if self
            .repository
            .find_file(request.file_id, &request.user_id)
            .await?
            .is_none()
        {
            return Err(GetFileError::FileNotFound(request.file_id));
        }

        let chunks = self
            .repository
            .file_chunks(request.file_id, &request.user_id)
            .await?;

        Ok(GetFileChunksResponse {
            file_id: request.file_id,
            chunks,
        })
    }
}
