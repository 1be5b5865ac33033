use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::use_cases::delete_file::DeleteFileResponse;
use crate::application::use_cases::get_file::{GetFileChunksResponse, GetFileResponse};
use crate::application::use_cases::ingest_file::IngestFileResponse;
use crate::domain::entities::{File, FileChunk, StoreStats};
use crate::domain::value_objects::{ChunkMetadata, IngestStatus};

#[derive(Debug, Serialize)]
pub struct IngestResponseDto {
    pub file_id: Uuid,
    pub status: IngestStatus,
    pub content_hash: String,
    pub chunks_total: usize,
    pub chunks_newly_embedded: usize,
    pub chunks_skipped: usize,
    pub state: String,
}

impl From<IngestFileResponse> for IngestResponseDto {
    fn from(response: IngestFileResponse) -> Self {
        Self {
            file_id: response.file_id,
            status: response.status,
            content_hash: response.content_hash.to_string(),
            chunks_total: response.chunks_total,
            chunks_newly_embedded: response.chunks_newly_embedded,
            chunks_skipped: response.chunks_skipped,
            state: response.state.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileResponseDto {
    pub id: Uuid,
    pub filename: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<File> for FileResponseDto {
    fn from(file: File) -> Self {
        Self {
            id: file.id(),
            filename: file.filename().to_string(),
            content_hash: file.content_hash().to_string(),
            created_at: file.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileDetailResponseDto {
    #[serde(flatten)]
    pub file: FileResponseDto,
    pub size: i64,
    pub chunk_count: i64,
}

impl From<GetFileResponse> for FileDetailResponseDto {
    fn from(response: GetFileResponse) -> Self {
        let details = response.details;
        Self {
            file: FileResponseDto::from(details.file),
            size: details.size,
            chunk_count: details.chunk_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaginationDto {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct PaginationMetaDto {
    pub offset: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct FileListResponseDto {
    pub files: Vec<FileResponseDto>,
    pub meta: PaginationMetaDto,
}

#[derive(Debug, Serialize)]
pub struct ChunkDto {
    pub chunk_hash: String,
    pub content: String,
    pub chunk_index: i32,
    pub metadata: ChunkMetadata,
}

impl From<FileChunk> for ChunkDto {
    fn from(chunk: FileChunk) -> Self {
        Self {
            chunk_hash: chunk.chunk_hash.to_string(),
            content: chunk.content,
            chunk_index: chunk.chunk_index,
            metadata: chunk.chunk_metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileChunksResponseDto {
    pub file_id: Uuid,
    pub chunks: Vec<ChunkDto>,
}

impl From<GetFileChunksResponse> for FileChunksResponseDto {
    fn from(response: GetFileChunksResponse) -> Self {
        Self {
            file_id: response.file_id,
            chunks: response.chunks.into_iter().map(ChunkDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponseDto {
    pub deleted: bool,
    pub pointer_removed: bool,
    pub content_collected: bool,
    pub chunks_collected: usize,
}

impl From<DeleteFileResponse> for DeleteResponseDto {
    fn from(response: DeleteFileResponse) -> Self {
        Self {
            deleted: response.success,
            pointer_removed: response.outcome.pointer_removed,
            content_collected: response.outcome.content_collected,
            chunks_collected: response.outcome.chunks_collected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponseDto {
    pub global_files: i64,
    pub global_chunks: i64,
    pub chunk_associations: i64,
    pub files: i64,
}

impl From<StoreStats> for StatsResponseDto {
    fn from(stats: StoreStats) -> Self {
        Self {
            global_files: stats.global_files,
            global_chunks: stats.global_chunks,
            chunk_associations: stats.associations,
            files: stats.files,
        }
    }
}
