use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::File;
use crate::domain::value_objects::ContentHash;
use crate::infrastructure::database::schema::files;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FileModel {
    pub id: Uuid,
    pub user_id: String,
    pub filename: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<&File> for FileModel {
    fn from(file: &File) -> Self {
        Self {
            id: file.id(),
            user_id: file.user_id().to_string(),
            filename: file.filename().to_string(),
            content_hash: file.content_hash().to_string(),
            created_at: file.created_at(),
        }
    }
}

impl TryFrom<FileModel> for File {
    type Error = String;

    fn try_from(model: FileModel) -> Result<Self, Self::Error> {
        let content_hash = ContentHash::new(model.content_hash).map_err(|e| e.to_string())?;
        Ok(File::restore(
            model.id,
            model.user_id,
            model.filename,
            content_hash,
            model.created_at,
        ))
    }
}
