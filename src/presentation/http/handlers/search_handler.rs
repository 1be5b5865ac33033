use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use crate::application::services::EmbeddingService;
use crate::application::use_cases::{
    SearchContentUseCase,
    search_content::{SearchContentError, SearchContentRequest},
};
use crate::presentation::http::dto::{ApiResponse, SearchRequestDto, SearchResponseDto};
use crate::presentation::http::extractors::UserId;

pub struct SearchHandler {
    search_use_case: Arc<SearchContentUseCase>,
    embedding_service: Arc<EmbeddingService>,
}

impl SearchHandler {
    pub fn new(
        search_use_case: Arc<SearchContentUseCase>,
        embedding_service: Arc<EmbeddingService>,
    ) -> Self {
        Self {
            search_use_case,
            embedding_service,
        }
    }

    pub async fn search(
        State(handler): State<Arc<SearchHandler>>,
        UserId(user_id): UserId,
        Json(request): Json<SearchRequestDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let query_embedding = match (request.query_embedding, request.query) {
            (Some(embedding), _) => embedding,
            (None, Some(text)) => match handler.embedding_service.embed_query(&text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    return Ok((
                        StatusCode::BAD_GATEWAY,
                        Json(ApiResponse::<SearchResponseDto>::error(
                            "EMBEDDING_FAILED",
                            e.to_string(),
                            None,
                        )),
                    ));
                }
            },
            (None, None) => {
                return Ok((
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<SearchResponseDto>::error(
                        "INVALID_QUERY",
                        "Either query or query_embedding is required",
                        None,
                    )),
                ));
            }
        };

        let request = SearchContentRequest {
            query_embedding,
            user_id,
            top_k: request.top_k,
            file_id_allowlist: request.file_ids,
        };

        match handler.search_use_case.execute(request).await {
            Ok(response) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(SearchResponseDto::from(response))),
            )),
            Err(SearchContentError::ValidationError(msg)) => Ok((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("INVALID_QUERY", msg, None)),
            )),
            Err(SearchContentError::StoreError(e)) => Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("SEARCH_FAILED", e.to_string(), None)),
            )),
        }
    }
}
