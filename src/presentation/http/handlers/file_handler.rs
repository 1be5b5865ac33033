use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::application::use_cases::{
    DeleteFileUseCase, GetFileChunksUseCase, GetFileUseCase, GetStoreStatsUseCase,
    IngestFileUseCase, ListFilesUseCase,
    delete_file::{DeleteFileError, DeleteFileRequest},
    get_file::{GetFileError, GetFileRequest},
    ingest_file::{IngestFileError, IngestFileRequest},
    list_files::ListFilesRequest,
};
use crate::domain::repositories::StoreError;
use crate::domain::value_objects::IngestStatus;
use crate::presentation::http::dto::{
    ApiResponse, DeleteResponseDto, FileChunksResponseDto, FileDetailResponseDto,
    FileListResponseDto, FileResponseDto, IngestResponseDto, PaginationDto, PaginationMetaDto,
    StatsResponseDto,
};
use crate::presentation::http::extractors::UserId;

fn store_error_status(error: &StoreError) -> (StatusCode, &'static str) {
    match error {
        StoreError::ConcurrentModification(_) => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),
        StoreError::Connection(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    }
}

pub struct FileHandler {
    ingest_file_use_case: Arc<IngestFileUseCase>,
    delete_file_use_case: Arc<DeleteFileUseCase>,
    get_file_use_case: Arc<GetFileUseCase>,
    get_file_chunks_use_case: Arc<GetFileChunksUseCase>,
    list_files_use_case: Arc<ListFilesUseCase>,
    store_stats_use_case: Arc<GetStoreStatsUseCase>,
}

impl FileHandler {
    pub fn new(
        ingest_file_use_case: Arc<IngestFileUseCase>,
        delete_file_use_case: Arc<DeleteFileUseCase>,
        get_file_use_case: Arc<GetFileUseCase>,
        get_file_chunks_use_case: Arc<GetFileChunksUseCase>,
        list_files_use_case: Arc<ListFilesUseCase>,
        store_stats_use_case: Arc<GetStoreStatsUseCase>,
    ) -> Self {
        Self {
            ingest_file_use_case,
            delete_file_use_case,
            get_file_use_case,
            get_file_chunks_use_case,
            list_files_use_case,
            store_stats_use_case,
        }
    }

    pub async fn upload_file(
        State(handler): State<Arc<FileHandler>>,
        UserId(user_id): UserId,
        mut multipart: Multipart,
    ) -> Result<impl IntoResponse, StatusCode> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
        {
            let Some(filename) = field.file_name().map(|name| name.to_string()) else {
                continue;
            };

            let data = field
                .bytes()
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?
                .to_vec();

            let request = IngestFileRequest {
                user_id,
                filename,
                data,
            };

            return Ok(match handler.ingest_file_use_case.execute(request).await {
                Ok(response) => {
                    let status = match response.status {
                        IngestStatus::Created => StatusCode::CREATED,
                        IngestStatus::Linked => StatusCode::OK,
                    };
                    (status, Json(ApiResponse::success(IngestResponseDto::from(response))))
                }
                Err(IngestFileError::ValidationError(msg)) => (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error("VALIDATION_FAILED", msg, None)),
                ),
                Err(IngestFileError::ParseError(e)) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ApiResponse::error("PARSE_FAILED", e.to_string(), None)),
                ),
                Err(IngestFileError::StoreError(e)) => {
                    error!(error = %e, "ingestion failed");
                    let (status, code) = store_error_status(&e);
                    (status, Json(ApiResponse::error(code, e.to_string(), None)))
                }
            });
        }

        Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<IngestResponseDto>::error(
                "NO_FILE_PROVIDED",
                "No file provided in the request",
                None,
            )),
        ))
    }

    pub async fn list_files(
        State(handler): State<Arc<FileHandler>>,
        UserId(user_id): UserId,
        Query(pagination): Query<PaginationDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = ListFilesRequest {
            user_id,
            skip: pagination.skip,
            limit: pagination.limit,
        };

        match handler.list_files_use_case.execute(request).await {
            Ok(response) => {
                let dto = FileListResponseDto {
                    files: response.files.into_iter().map(FileResponseDto::from).collect(),
                    meta: PaginationMetaDto {
                        offset: response.skip,
                        limit: response.limit,
                        total: response.total_count,
                    },
                };
                Ok((StatusCode::OK, Json(ApiResponse::success(dto))))
            }
            Err(e) => {
                let (status, code) = store_error_status(&e);
                Ok((status, Json(ApiResponse::error(code, e.to_string(), None))))
            }
        }
    }

    pub async fn get_file(
        State(handler): State<Arc<FileHandler>>,
        UserId(user_id): UserId,
        Path(file_id): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = GetFileRequest { file_id, user_id };

        match handler.get_file_use_case.execute(request).await {
            Ok(response) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(FileDetailResponseDto::from(response))),
            )),
            Err(e) => Ok(Self::get_error_response(e)),
        }
    }

    pub async fn get_file_chunks(
        State(handler): State<Arc<FileHandler>>,
        UserId(user_id): UserId,
        Path(file_id): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = GetFileRequest { file_id, user_id };

        match handler.get_file_chunks_use_case.execute(request).await {
            Ok(response) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(FileChunksResponseDto::from(response))),
            )),
            Err(e) => Ok(Self::get_error_response(e)),
        }
    }

    pub async fn delete_file(
        State(handler): State<Arc<FileHandler>>,
        UserId(user_id): UserId,
        Path(file_id): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = DeleteFileRequest { file_id, user_id };

        match handler.delete_file_use_case.execute(request).await {
            Ok(response) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(DeleteResponseDto::from(response))),
            )),
            Err(DeleteFileError::ValidationError(msg)) => Ok((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("VALIDATION_FAILED", msg, None)),
            )),
            Err(DeleteFileError::StoreError(e)) => {
                let (status, code) = store_error_status(&e);
                Ok((status, Json(ApiResponse::error(code, e.to_string(), None))))
            }
        }
    }

    pub async fn stats(State(handler): State<Arc<FileHandler>>) -> Result<impl IntoResponse, StatusCode> {
        match handler.store_stats_use_case.execute().await {
            Ok(stats) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(StatsResponseDto::from(stats))),
            )),
            Err(e) => {
                let (status, code) = store_error_status(&e);
                Ok((status, Json(ApiResponse::error(code, e.to_string(), None))))
            }
        }
    }

    fn get_error_response<T>(error: GetFileError) -> (StatusCode, Json<ApiResponse<T>>) {
        match error {
            GetFileError::FileNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("FILE_NOT_FOUND", error.to_string(), None)),
            ),
            GetFileError::StoreError(e) => {
                let (status, code) = store_error_status(&e);
                (status, Json(ApiResponse::error(code, e.to_string(), None)))
            }
        }
    }
}
