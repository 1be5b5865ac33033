use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

use crate::domain::entities::GlobalChunk;
use crate::domain::value_objects::ChunkHash;
use crate::infrastructure::database::schema::global_chunks;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = global_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GlobalChunkModel {
    pub hash: String,
    pub content: String,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
}

impl From<&GlobalChunk> for GlobalChunkModel {
    fn from(chunk: &GlobalChunk) -> Self {
        Self {
            hash: chunk.hash().to_string(),
            content: chunk.content().to_string(),
            embedding: chunk.embedding().clone(),
            created_at: chunk.created_at(),
        }
    }
}

impl TryFrom<GlobalChunkModel> for GlobalChunk {
    type Error = String;

    fn try_from(model: GlobalChunkModel) -> Result<Self, Self::Error> {
        let hash = ChunkHash::new(model.hash).map_err(|e| e.to_string())?;
        Ok(GlobalChunk::restore(
            hash,
            model.content,
            model.embedding,
            model.created_at,
        ))
    }
}
