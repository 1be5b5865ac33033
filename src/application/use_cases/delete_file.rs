use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::repositories::{DedupRepository, StoreError};
use crate::domain::services::DeletionOutcome;

#[derive(Debug, Error)]
pub enum DeleteFileError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct DeleteFileRequest {
    pub file_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteFileResponse {
    /// Always true when the call did not fail: deleting a missing or foreign
    /// pointer is a successful no-op.
    pub success: bool,
    pub outcome: DeletionOutcome,
}

/// Removes a user's pointer and collects orphaned content and chunks in the
/// same transaction.
pub struct DeleteFileUseCase {
    repository: Arc<dyn DedupRepository>,
    max_attempts: usize,
}

impl DeleteFileUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self {
            repository,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn execute(
        &self,
        request: DeleteFileRequest,
    ) -> Result<DeleteFileResponse, DeleteFileError> {
        if request.user_id.trim().is_empty() {
            return Err(DeleteFileError::ValidationError(
                "User id cannot be empty".to_string(),
            ));
        }

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;

            match self
                .repository
                .delete_file(request.file_id, &request.user_id)
                .await
            {
                Ok(outcome) => break outcome,
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, file_id = %request.file_id, error = %e, "delete conflicted, retrying");
                }
                Err(e @ StoreError::IntegrityViolation(_)) => {
                    error!(file_id = %request.file_id, error = %e, "orphan collection hit an integrity violation");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        };

        if outcome.pointer_removed {
            info!(
                file_id = %request.file_id,
                user_id = %request.user_id,
                content_collected = outcome.content_collected,
                chunks_collected = outcome.chunks_collected,
                "file deleted"
            );
        } else {
            info!(file_id = %request.file_id, user_id = %request.user_id, "delete was a no-op");
        }

        Ok(DeleteFileResponse {
            success: true,
            outcome,
        })
    }
}
