use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::presentation::http::handlers::FileHandler;

pub fn file_routes(file_handler: Arc<FileHandler>) -> Router {
    Router::new()
        .route("/files", post(FileHandler::upload_file).get(FileHandler::list_files))
        .route("/files/{file_id}/chunks", get(FileHandler::get_file_chunks))
        .route(
            "/files/{file_id}",
            get(FileHandler::get_file).delete(FileHandler::delete_file),
        )
        .route("/stats", get(FileHandler::stats))
        .with_state(file_handler)
}
