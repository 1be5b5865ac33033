use std::sync::Arc;

use crate::domain::entities::StoreStats;
use crate::domain::repositories::{DedupRepository, StoreError};

/// Row counts of the four tables, used to observe garbage collection.
pub struct GetStoreStatsUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl GetStoreStatsUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self) -> Result<StoreStats, StoreError> {
        self.repository.stats().await
    }
}
