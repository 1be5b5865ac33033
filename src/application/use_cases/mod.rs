pub mod delete_file;
pub mod get_file;
pub mod ingest_file;
pub mod list_files;
pub mod search_content;
pub mod store_stats;

pub use delete_file::DeleteFileUseCase;
pub use get_file::{GetFileChunksUseCase, GetFileUseCase};
pub use ingest_file::IngestFileUseCase;
pub use list_files::ListFilesUseCase;
pub use search_content::SearchContentUseCase;
pub use store_stats::GetStoreStatsUseCase;
