use std::sync::Arc;

use crate::domain::entities::File;
use crate::domain::repositories::{DedupRepository, StoreError};

#[derive(Debug, Clone)]
pub struct ListFilesRequest {
    pub user_id: String,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct ListFilesResponse {
    pub files: Vec<File>,
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

pub struct ListFilesUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl ListFilesUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, request: ListFilesRequest) -> Result<ListFilesResponse, StoreError> {
        let skip = request.skip.max(0);
        let limit = request.limit.clamp(1, 100);

        let all = self.repository.list_files(&request.user_id).await?;
        let total_count = all.len() as i64;
        let files = all
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();

        Ok(ListFilesResponse {
            files,
            total_count,
            skip,
            limit,
        })
    }
}
