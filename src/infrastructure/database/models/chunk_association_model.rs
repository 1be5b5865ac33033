use diesel::prelude::*;

use crate::domain::entities::ChunkAssociation;
use crate::domain::value_objects::{ChunkHash, ChunkMetadata, ContentHash};
use crate::infrastructure::database::schema::chunk_associations;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = chunk_associations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChunkAssociationModel {
    pub global_file_hash: String,
    pub chunk_hash: String,
    pub chunk_index: i32,
    pub chunk_metadata: serde_json::Value,
}

impl From<&ChunkAssociation> for ChunkAssociationModel {
    fn from(association: &ChunkAssociation) -> Self {
        Self {
            global_file_hash: association.global_file_hash().to_string(),
            chunk_hash: association.chunk_hash().to_string(),
            chunk_index: association.chunk_index(),
            chunk_metadata: serde_json::Value::from(association.chunk_metadata()),
        }
    }
}

impl TryFrom<ChunkAssociationModel> for ChunkAssociation {
    type Error = String;

    fn try_from(model: ChunkAssociationModel) -> Result<Self, Self::Error> {
        Ok(ChunkAssociation::new(
            ContentHash::new(model.global_file_hash).map_err(|e| e.to_string())?,
            ChunkHash::new(model.chunk_hash).map_err(|e| e.to_string())?,
            model.chunk_index,
            ChunkMetadata::try_from(model.chunk_metadata)?,
        ))
    }
}
