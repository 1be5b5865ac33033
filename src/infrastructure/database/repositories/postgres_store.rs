use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, Text};
use pgvector::{Vector, VectorExpressionMethods};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{
    ChunkAssociation, ChunkSearchHit, File, FileChunk, GlobalChunk, GlobalFile, StoreStats,
};
use crate::domain::repositories::{
    RowLock, StoreError, StoreResult, StoreTransaction, TransactionRunner,
};
use crate::domain::value_objects::{ChunkHash, ChunkMetadata, ContentHash};
use crate::infrastructure::database::models::{
    ChunkAssociationModel, FileModel, GlobalChunkModel, GlobalFileModel,
};
use crate::infrastructure::database::schema::{
    chunk_associations, files, global_chunks, global_files,
};
use crate::infrastructure::database::{DbPool, get_connection_from_pool};

/// Rows per multi-row INSERT, well under the bind parameter limit.
const INSERT_BATCH: usize = 500;

pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

enum TransactionError {
    Store(StoreError),
    Diesel(DieselError),
}

impl From<DieselError> for TransactionError {
    fn from(error: DieselError) -> Self {
        TransactionError::Diesel(error)
    }
}

impl From<TransactionError> for StoreError {
    fn from(error: TransactionError) -> Self {
        match error {
            TransactionError::Store(e) => e,
            TransactionError::Diesel(e) => map_diesel_error(e),
        }
    }
}

fn map_diesel_error(error: DieselError) -> StoreError {
    match &error {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            StoreError::ConcurrentModification(info.message().to_string())
        }
        DieselError::DatabaseError(_, info) if info.message().contains("deadlock detected") => {
            StoreError::ConcurrentModification(info.message().to_string())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StoreError::IntegrityViolation(info.message().to_string())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StoreError::Connection(info.message().to_string())
        }
        _ => StoreError::Database(error.to_string()),
    }
}

impl TransactionRunner for PostgresStore {
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut pooled =
            get_connection_from_pool(&self.pool).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<(), TransactionError, _>(|conn| {
            let mut tx = PgStoreTransaction { conn };
            work(&mut tx).map_err(TransactionError::Store)
        })
        .map_err(StoreError::from)
    }

    fn run_read_only(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut pooled =
            get_connection_from_pool(&self.pool).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn: &mut PgConnection = &mut pooled;

        conn.build_transaction()
            .read_only()
            .run::<(), TransactionError, _>(|conn| {
                let mut tx = PgStoreTransaction { conn };
                work(&mut tx).map_err(TransactionError::Store)
            })
            .map_err(StoreError::from)
    }
}

#[derive(QueryableByName)]
struct HashRow {
    #[diesel(sql_type = Text)]
    hash: String,
}

struct PgStoreTransaction<'c> {
    conn: &'c mut PgConnection,
}

fn parse_chunk_hash(raw: String) -> StoreResult<ChunkHash> {
    ChunkHash::new(raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn parse_metadata(raw: serde_json::Value) -> StoreResult<ChunkMetadata> {
    ChunkMetadata::try_from(raw).map_err(StoreError::InvalidData)
}

fn hash_keys<'a>(hashes: impl IntoIterator<Item = &'a ChunkHash>) -> Vec<String> {
    hashes.into_iter().map(|h| h.as_str().to_string()).collect()
}

impl StoreTransaction for PgStoreTransaction<'_> {
    fn content_exists(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        diesel::select(exists(global_files::table.find(hash.as_str())))
            .get_result(self.conn)
            .map_err(map_diesel_error)
    }

    fn find_content(
        &mut self,
        hash: &ContentHash,
        lock: RowLock,
    ) -> StoreResult<Option<GlobalFile>> {
        let query = global_files::table
            .find(hash.as_str())
            .select(GlobalFileModel::as_select());

        let model = match lock {
            RowLock::None => query.first(self.conn).optional(),
            RowLock::KeyShare => query.for_key_share().first(self.conn).optional(),
            RowLock::Update => query.for_update().first(self.conn).optional(),
        }
        .map_err(map_diesel_error)?;

        model
            .map(GlobalFile::try_from)
            .transpose()
            .map_err(StoreError::InvalidData)
    }

    fn upsert_content(&mut self, content: &GlobalFile) -> StoreResult<bool> {
        let inserted = diesel::insert_into(global_files::table)
            .values(GlobalFileModel::from(content))
            .on_conflict_do_nothing()
            .execute(self.conn)
            .map_err(map_diesel_error)?;

        Ok(inserted > 0)
    }

    fn delete_content(&mut self, hash: &ContentHash) -> StoreResult<bool> {
        let deleted = diesel::delete(global_files::table.find(hash.as_str()))
            .execute(self.conn)
            .map_err(map_diesel_error)?;

        Ok(deleted > 0)
    }

    fn existing_chunk_hashes(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
        lock: RowLock,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        if candidates.is_empty() {
            return Ok(BTreeSet::new());
        }

        let query = global_chunks::table
            .filter(global_chunks::hash.eq_any(hash_keys(candidates)))
            .order(global_chunks::hash.asc())
            .select(global_chunks::hash);

        let rows: Vec<String> = match lock {
            RowLock::None => query.load(self.conn),
            RowLock::KeyShare => query.for_key_share().load(self.conn),
            RowLock::Update => query.for_update().load(self.conn),
        }
        .map_err(map_diesel_error)?;

        rows.into_iter().map(parse_chunk_hash).collect()
    }

    fn upsert_chunks(&mut self, chunks: &[GlobalChunk]) -> StoreResult<usize> {
        let mut models: Vec<GlobalChunkModel> = chunks.iter().map(GlobalChunkModel::from).collect();
        models.sort_by(|a, b| a.hash.cmp(&b.hash));

        let mut inserted = 0;
        for batch in models.chunks(INSERT_BATCH) {
            inserted += diesel::insert_into(global_chunks::table)
                .values(batch)
                .on_conflict_do_nothing()
                .execute(self.conn)
                .map_err(map_diesel_error)?;
        }

        Ok(inserted)
    }

    fn find_chunk(&mut self, hash: &ChunkHash) -> StoreResult<Option<GlobalChunk>> {
        let model = global_chunks::table
            .find(hash.as_str())
            .select(GlobalChunkModel::as_select())
            .first(self.conn)
            .optional()
            .map_err(map_diesel_error)?;

        model
            .map(GlobalChunk::try_from)
            .transpose()
            .map_err(StoreError::InvalidData)
    }

    fn delete_unreferenced_chunks(
        &mut self,
        candidates: &BTreeSet<ChunkHash>,
    ) -> StoreResult<BTreeSet<ChunkHash>> {
        if candidates.is_empty() {
            return Ok(BTreeSet::new());
        }

        // Lock in hash order first so concurrent collectors never deadlock
        // against each other.
        let locked: Vec<String> = global_chunks::table
            .filter(global_chunks::hash.eq_any(hash_keys(candidates)))
            .order(global_chunks::hash.asc())
            .select(global_chunks::hash)
            .for_update()
            .load(self.conn)
            .map_err(map_diesel_error)?;

        if locked.is_empty() {
            return Ok(BTreeSet::new());
        }

        let removed: Vec<HashRow> = diesel::sql_query(
            "DELETE FROM global_chunks c \
             WHERE c.hash = ANY($1) \
             AND NOT EXISTS (SELECT 1 FROM chunk_associations a WHERE a.chunk_hash = c.hash) \
             RETURNING c.hash",
        )
        .bind::<Array<Text>, _>(locked)
        .load(self.conn)
        .map_err(map_diesel_error)?;

        debug!(candidates = candidates.len(), removed = removed.len(), "orphan chunks collected");

        removed.into_iter().map(|row| parse_chunk_hash(row.hash)).collect()
    }

    fn link_chunks(&mut self, associations: &[ChunkAssociation]) -> StoreResult<usize> {
        let mut models: Vec<ChunkAssociationModel> =
            associations.iter().map(ChunkAssociationModel::from).collect();
        models.sort_by(|a, b| {
            (&a.global_file_hash, &a.chunk_hash).cmp(&(&b.global_file_hash, &b.chunk_hash))
        });

        let mut linked = 0;
        for batch in models.chunks(INSERT_BATCH) {
            linked += diesel::insert_into(chunk_associations::table)
                .values(batch)
                .on_conflict_do_nothing()
                .execute(self.conn)
                .map_err(map_diesel_error)?;
        }

        Ok(linked)
    }

    fn chunk_hashes_for_content(&mut self, hash: &ContentHash) -> StoreResult<BTreeSet<ChunkHash>> {
        let rows: Vec<String> = chunk_associations::table
            .filter(chunk_associations::global_file_hash.eq(hash.as_str()))
            .select(chunk_associations::chunk_hash)
            .load(self.conn)
            .map_err(map_diesel_error)?;

        rows.into_iter().map(parse_chunk_hash).collect()
    }

    fn count_associations_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        chunk_associations::table
            .filter(chunk_associations::global_file_hash.eq(hash.as_str()))
            .select(count_star())
            .get_result(self.conn)
            .map_err(map_diesel_error)
    }

    fn insert_file(&mut self, file: &File) -> StoreResult<()> {
        diesel::insert_into(files::table)
            .values(FileModel::from(file))
            .execute(self.conn)
            .map_err(map_diesel_error)?;

        Ok(())
    }

    fn find_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        let model = files::table
            .filter(files::id.eq(file_id))
            .filter(files::user_id.eq(user_id))
            .select(FileModel::as_select())
            .first(self.conn)
            .optional()
            .map_err(map_diesel_error)?;

        model.map(File::try_from).transpose().map_err(StoreError::InvalidData)
    }

    fn list_files(&mut self, user_id: &str) -> StoreResult<Vec<File>> {
        let models = files::table
            .filter(files::user_id.eq(user_id))
            .order((files::created_at.desc(), files::id.asc()))
            .select(FileModel::as_select())
            .load(self.conn)
            .map_err(map_diesel_error)?;

        models
            .into_iter()
            .map(|m| File::try_from(m).map_err(StoreError::InvalidData))
            .collect()
    }

    fn delete_file(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Option<File>> {
        let model = diesel::delete(
            files::table
                .filter(files::id.eq(file_id))
                .filter(files::user_id.eq(user_id)),
        )
        .returning(FileModel::as_returning())
        .get_result(self.conn)
        .optional()
        .map_err(map_diesel_error)?;

        model.map(File::try_from).transpose().map_err(StoreError::InvalidData)
    }

    fn count_files_for_content(&mut self, hash: &ContentHash) -> StoreResult<i64> {
        files::table
            .filter(files::content_hash.eq(hash.as_str()))
            .select(count_star())
            .get_result(self.conn)
            .map_err(map_diesel_error)
    }

    fn file_chunks(&mut self, file_id: Uuid, user_id: &str) -> StoreResult<Vec<FileChunk>> {
        let rows: Vec<(Uuid, String, String, i32, serde_json::Value)> = files::table
            .inner_join(
                chunk_associations::table
                    .on(chunk_associations::global_file_hash.eq(files::content_hash)),
            )
            .inner_join(
                global_chunks::table.on(global_chunks::hash.eq(chunk_associations::chunk_hash)),
            )
            .filter(files::id.eq(file_id))
            .filter(files::user_id.eq(user_id))
            .order(chunk_associations::chunk_index.asc())
            .select((
                files::id,
                global_chunks::hash,
                global_chunks::content,
                chunk_associations::chunk_index,
                chunk_associations::chunk_metadata,
            ))
            .load(self.conn)
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|(file_id, hash, content, chunk_index, metadata)| {
                Ok(FileChunk {
                    file_id,
                    chunk_hash: parse_chunk_hash(hash)?,
                    content,
                    chunk_index,
                    chunk_metadata: parse_metadata(metadata)?,
                })
            })
            .collect()
    }

    fn search(
        &mut self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        file_allowlist: Option<&[Uuid]>,
    ) -> StoreResult<Vec<ChunkSearchHit>> {
        let query = Vector::from(query.to_vec());

        let mut statement = files::table
            .inner_join(
                chunk_associations::table
                    .on(chunk_associations::global_file_hash.eq(files::content_hash)),
            )
            .inner_join(
                global_chunks::table.on(global_chunks::hash.eq(chunk_associations::chunk_hash)),
            )
            .filter(files::user_id.eq(user_id.to_string()))
            .select((
                files::id,
                files::filename,
                global_chunks::hash,
                global_chunks::content,
                chunk_associations::chunk_index,
                chunk_associations::chunk_metadata,
                global_chunks::embedding.cosine_distance(query.clone()),
            ))
            .order((
                global_chunks::embedding.cosine_distance(query).asc(),
                files::id.asc(),
                chunk_associations::chunk_index.asc(),
            ))
            .limit(top_k as i64)
            .into_boxed();

        if let Some(ids) = file_allowlist {
            statement = statement.filter(files::id.eq_any(ids.to_vec()));
        }

        let rows: Vec<(Uuid, String, String, String, i32, serde_json::Value, f64)> =
            statement.load(self.conn).map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|(file_id, filename, hash, content, chunk_index, metadata, distance)| {
                Ok(ChunkSearchHit {
                    file_id,
                    filename,
                    chunk_hash: parse_chunk_hash(hash)?,
                    content,
                    chunk_index,
                    chunk_metadata: parse_metadata(metadata)?,
                    similarity_score: (1.0 - distance) as f32,
                })
            })
            .collect()
    }

    fn stats(&mut self) -> StoreResult<StoreStats> {
        Ok(StoreStats {
            global_files: global_files::table
                .count()
                .get_result(self.conn)
                .map_err(map_diesel_error)?,
            global_chunks: global_chunks::table
                .count()
                .get_result(self.conn)
                .map_err(map_diesel_error)?,
            associations: chunk_associations::table
                .count()
                .get_result(self.conn)
                .map_err(map_diesel_error)?,
            files: files::table
                .count()
                .get_result(self.conn)
                .map_err(map_diesel_error)?,
        })
    }
}
