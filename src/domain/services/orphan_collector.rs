use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::repositories::{RowLock, StoreError, StoreResult, StoreTransaction};
use crate::domain::value_objects::ContentHash;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    /// False when the pointer did not exist or belongs to someone else.
    pub pointer_removed: bool,
    pub content_hash: Option<ContentHash>,
    pub content_collected: bool,
    pub chunks_collected: usize,
}

/// Deletes a user's pointer and garbage-collects whatever it was the last
/// reference to. Must run inside the same transaction as the caller's
/// commit; nothing here is observable until then.
///
/// The content row is locked `FOR UPDATE` before recounting so a concurrent
/// fast-path link of the same content either finishes first (and is counted)
/// or waits and then finds the content gone.
pub fn delete_and_collect(
    tx: &mut dyn StoreTransaction,
    file_id: Uuid,
    user_id: &str,
) -> StoreResult<DeletionOutcome> {
    let Some(file) = tx.delete_file(file_id, user_id)? else {
        return Ok(DeletionOutcome::default());
    };

    let hash = file.content_hash().clone();

    if tx.find_content(&hash, RowLock::Update)?.is_none() {
        error!(%file_id, content_hash = %hash, "pointer referenced missing content");
        return Err(StoreError::IntegrityViolation(format!(
            "file {} referenced missing content {}",
            file_id, hash
        )));
    }

    let remaining = tx.count_files_for_content(&hash)?;
    if remaining > 0 {
        debug!(%file_id, content_hash = %hash, remaining, "content still referenced");
        return Ok(DeletionOutcome {
            pointer_removed: true,
            content_hash: Some(hash),
            content_collected: false,
            chunks_collected: 0,
        });
    }

    // Captured before the cascade removes the association rows.
    let candidates = tx.chunk_hashes_for_content(&hash)?;

    if !tx.delete_content(&hash)? {
        return Err(StoreError::IntegrityViolation(format!(
            "content {} disappeared under a row lock",
            hash
        )));
    }

    let collected = tx.delete_unreferenced_chunks(&candidates)?;

    debug!(
        %file_id,
        content_hash = %hash,
        candidates = candidates.len(),
        collected = collected.len(),
        "content collected"
    );

    Ok(DeletionOutcome {
        pointer_removed: true,
        content_hash: Some(hash),
        content_collected: true,
        chunks_collected: collected.len(),
    })
}
