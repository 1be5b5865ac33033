use std::collections::BTreeSet;
use tracing::debug;

use crate::domain::entities::{ChunkAssociation, File, GlobalChunk, GlobalFile};
use crate::domain::repositories::{RowLock, StoreError, StoreResult, StoreTransaction};
use crate::domain::value_objects::ChunkHash;

/// Everything the persisting step writes for one new upload.
#[derive(Debug, Clone)]
pub struct IngestionPlan {
    pub user_id: String,
    pub filename: String,
    pub content: GlobalFile,
    /// Chunks embedded during this run.
    pub new_chunks: Vec<GlobalChunk>,
    /// Chunks that already existed when duplicates were checked.
    pub reused_chunks: BTreeSet<ChunkHash>,
    pub associations: Vec<ChunkAssociation>,
}

#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub file: File,
    pub content_created: bool,
    pub chunks_inserted: usize,
    pub associations_linked: usize,
}

impl IngestionPlan {
    /// Every association must belong to this content and point at a chunk
    /// the plan either brings or reuses.
    pub fn validate(&self) -> StoreResult<()> {
        let new_hashes: BTreeSet<&ChunkHash> = self.new_chunks.iter().map(|c| c.hash()).collect();

        for association in &self.associations {
            if association.global_file_hash() != self.content.hash() {
                return Err(StoreError::IntegrityViolation(format!(
                    "association for {} attached to content {}",
                    association.global_file_hash(),
                    self.content.hash()
                )));
            }

            let chunk = association.chunk_hash();
            if !new_hashes.contains(chunk) && !self.reused_chunks.contains(chunk) {
                return Err(StoreError::IntegrityViolation(format!(
                    "association references chunk {} that has no embedding",
                    chunk
                )));
            }
        }

        Ok(())
    }
}

/// Writes content, chunks, associations and the user's pointer inside the
/// caller's transaction.
///
/// Every chunk about to be linked is locked `FOR KEY SHARE` after the chunk
/// insert, reused or not: an insert that hit an already committed row takes
/// no lock, so a concurrent collector may still remove it. A missing chunk
/// makes the run report `ConcurrentModification` and the orchestrator
/// re-checks duplicates.
pub fn persist_ingestion(
    tx: &mut dyn StoreTransaction,
    plan: &IngestionPlan,
) -> StoreResult<PersistOutcome> {
    plan.validate()?;

    let content_hash = plan.content.hash();
    let content_created = tx.upsert_content(&plan.content)?;

    if tx.find_content(content_hash, RowLock::KeyShare)?.is_none() {
        return Err(StoreError::ConcurrentModification(format!(
            "content {} removed while persisting",
            content_hash
        )));
    }

    let chunks_inserted = tx.upsert_chunks(&plan.new_chunks)?;

    let linked: BTreeSet<ChunkHash> = plan
        .associations
        .iter()
        .map(|a| a.chunk_hash().clone())
        .collect();
    let still_present = tx.existing_chunk_hashes(&linked, RowLock::KeyShare)?;
    let vanished = linked.difference(&still_present).count();
    if vanished > 0 {
        return Err(StoreError::ConcurrentModification(format!(
            "{} chunk(s) collected while persisting",
            vanished
        )));
    }

    let associations_linked = tx.link_chunks(&plan.associations)?;

    let file = File::new(
        plan.user_id.clone(),
        plan.filename.clone(),
        content_hash.clone(),
    );
    tx.insert_file(&file)?;

    debug!(
        file_id = %file.id(),
        content_hash = %content_hash,
        content_created,
        chunks_inserted,
        associations_linked,
        "ingestion persisted"
    );

    Ok(PersistOutcome {
        file,
        content_created,
        chunks_inserted,
        associations_linked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::TransactionRunner;
    use crate::domain::value_objects::{ChunkMetadata, chunk_hash, content_hash};
    use crate::infrastructure::memory::InMemoryStore;
    use pgvector::Vector;

    fn chunk(text: &str) -> GlobalChunk {
        GlobalChunk::new(text.to_string(), Vector::from(vec![1.0, 0.0])).unwrap()
    }

    fn plan(bytes: &[u8], new_chunks: Vec<GlobalChunk>, reused: &[&str]) -> IngestionPlan {
        let content = GlobalFile::from_bytes(bytes);
        let reused_chunks: BTreeSet<ChunkHash> = reused.iter().map(|t| chunk_hash(t)).collect();
        let associations = new_chunks
            .iter()
            .map(|c| c.hash().clone())
            .chain(reused_chunks.iter().cloned())
            .enumerate()
            .map(|(i, hash)| {
                ChunkAssociation::new(content.hash().clone(), hash, i as i32, ChunkMetadata::default())
            })
            .collect();

        IngestionPlan {
            user_id: "u1".to_string(),
            filename: "doc.txt".to_string(),
            content,
            new_chunks,
            reused_chunks,
            associations,
        }
    }

    fn persist(store: &InMemoryStore, plan: &IngestionPlan) -> StoreResult<PersistOutcome> {
        let mut outcome = None;
        store.run_in_transaction(&mut |tx| {
            outcome = Some(persist_ingestion(tx, plan)?);
            Ok(())
        })?;
        Ok(outcome.unwrap())
    }

    #[test]
    fn test_validate_rejects_association_for_other_content() {
        let mut plan = plan(b"doc", vec![chunk("alpha")], &[]);
        plan.associations.push(ChunkAssociation::new(
            content_hash(b"other"),
            chunk_hash("alpha"),
            1,
            ChunkMetadata::default(),
        ));

        assert!(matches!(plan.validate(), Err(StoreError::IntegrityViolation(_))));
    }

    #[test]
    fn test_validate_rejects_chunk_without_embedding() {
        let mut plan = plan(b"doc", vec![chunk("alpha")], &[]);
        plan.associations.push(ChunkAssociation::new(
            plan.content.hash().clone(),
            chunk_hash("never embedded"),
            1,
            ChunkMetadata::default(),
        ));

        assert!(matches!(plan.validate(), Err(StoreError::IntegrityViolation(_))));
    }

    #[test]
    fn test_persist_writes_content_chunks_and_pointer() {
        let store = InMemoryStore::new();
        let plan = plan(b"doc", vec![chunk("alpha"), chunk("beta")], &[]);

        let outcome = persist(&store, &plan).unwrap();

        assert!(outcome.content_created);
        assert_eq!(outcome.chunks_inserted, 2);
        assert_eq!(outcome.associations_linked, 2);
        assert_eq!(outcome.file.content_hash(), plan.content.hash());
    }

    #[test]
    fn test_persist_links_reused_chunks_without_reinserting() {
        let store = InMemoryStore::new();
        persist(&store, &plan(b"first", vec![chunk("shared")], &[])).unwrap();

        let outcome = persist(&store, &plan(b"second", vec![chunk("own")], &["shared"])).unwrap();

        assert_eq!(outcome.chunks_inserted, 1);
        assert_eq!(outcome.associations_linked, 2);
    }

    #[test]
    fn test_missing_reused_chunk_is_a_conflict() {
        let store = InMemoryStore::new();
        let plan = plan(b"doc", vec![chunk("alpha")], &["collected meanwhile"]);

        let result = persist(&store, &plan);

        assert!(matches!(result, Err(StoreError::ConcurrentModification(_))));
        let mut exists = true;
        store
            .run_read_only(&mut |tx| {
                exists = tx.content_exists(plan.content.hash())?;
                Ok(())
            })
            .unwrap();
        assert!(!exists);
    }
}
