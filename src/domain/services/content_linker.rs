use tracing::debug;

use crate::domain::entities::File;
use crate::domain::repositories::{RowLock, StoreResult, StoreTransaction};
use crate::domain::value_objects::ContentHash;

/// Fast path for known content: creates only the user's pointer.
///
/// Returns `None` when the content row is gone by the time the key-share
/// lock is granted (a concurrent delete collected it); the caller then
/// falls back to the full pipeline.
pub fn link_existing_content(
    tx: &mut dyn StoreTransaction,
    user_id: &str,
    filename: &str,
    hash: &ContentHash,
) -> StoreResult<Option<File>> {
    if tx.find_content(hash, RowLock::KeyShare)?.is_none() {
        debug!(content_hash = %hash, "content vanished before it could be linked");
        return Ok(None);
    }

    let file = File::new(user_id.to_string(), filename.to_string(), hash.clone());
    tx.insert_file(&file)?;

    Ok(Some(file))
}
