use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::GlobalFile;
use crate::domain::value_objects::ContentHash;
use crate::infrastructure::database::schema::global_files;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = global_files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GlobalFileModel {
    pub hash: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&GlobalFile> for GlobalFileModel {
    fn from(content: &GlobalFile) -> Self {
        Self {
            hash: content.hash().to_string(),
            size: content.size(),
            created_at: content.created_at(),
        }
    }
}

impl TryFrom<GlobalFileModel> for GlobalFile {
    type Error = String;

    fn try_from(model: GlobalFileModel) -> Result<Self, Self::Error> {
        let hash = ContentHash::new(model.hash).map_err(|e| e.to_string())?;
        Ok(GlobalFile::restore(hash, model.size, model.created_at))
    }
}
