use std::sync::Arc;
use tracing::info;

use crate::{
    application::{
        ports::{Chunker, DocumentParser, EmbeddingProvider},
        services::EmbeddingService,
        use_cases::{
            DeleteFileUseCase, GetFileChunksUseCase, GetFileUseCase, GetStoreStatsUseCase,
            IngestFileUseCase, ListFilesUseCase, SearchContentUseCase,
        },
    },
    config::{AppConfig, EmbeddingsBackend, StoreBackend},
    domain::repositories::{DedupRepository, TransactionRunner, TransactionalDedupRepository},
    infrastructure::{
        database::{PostgresStore, create_connection_pool, run_migrations},
        external_services::{
            EmbeddingsClientConfig, HashingEmbeddingProvider, InferenceClient,
            InferenceEmbeddingProvider, PlainTextParser, RecursiveChunker,
        },
        memory::InMemoryStore,
    },
    presentation::http::{
        HttpServer,
        handlers::{FileHandler, SearchHandler},
    },
};

/// Explicitly wired application graph. Each container owns its own store
/// handle, so tests can build as many isolated instances as they like.
pub struct AppContainer {
    pub repository: Arc<dyn DedupRepository>,
    pub embedding_provider: Arc<dyn EmbeddingProvider>,
    pub embedding_service: Arc<EmbeddingService>,

    pub ingest_file_use_case: Arc<IngestFileUseCase>,
    pub delete_file_use_case: Arc<DeleteFileUseCase>,
    pub get_file_use_case: Arc<GetFileUseCase>,
    pub get_file_chunks_use_case: Arc<GetFileChunksUseCase>,
    pub list_files_use_case: Arc<ListFilesUseCase>,
    pub search_content_use_case: Arc<SearchContentUseCase>,
    pub store_stats_use_case: Arc<GetStoreStatsUseCase>,

    pub file_handler: Arc<FileHandler>,
    pub search_handler: Arc<SearchHandler>,

    config: AppConfig,
}

impl AppContainer {
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let runner: Arc<dyn TransactionRunner> = match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .ok_or("DATABASE_URL is required for the postgres backend")?;
                let pool = create_connection_pool(database_url, config.database_pool_size)?;
                run_migrations(&pool)?;
                info!(pool_size = config.database_pool_size, "postgres store ready");
                Arc::new(PostgresStore::new(pool))
            }
            StoreBackend::Memory => match &config.snapshot_path {
                Some(path) => Arc::new(InMemoryStore::open(path)?),
                None => Arc::new(InMemoryStore::new()),
            },
        };

        let embedding_provider: Arc<dyn EmbeddingProvider> = match config.embeddings_backend {
            EmbeddingsBackend::Http => {
                let client = InferenceClient::new(EmbeddingsClientConfig {
                    service_url: config.embeddings_service_url.clone(),
                    model_name: config.embedding_model.clone(),
                    dimension: config.embedding_dimension,
                    max_retries: config.embedding_max_retries,
                    timeout_secs: config.embedding_timeout_secs,
                    ..EmbeddingsClientConfig::default()
                })?;
                Arc::new(InferenceEmbeddingProvider::new(client))
            }
            EmbeddingsBackend::Hashing => {
                Arc::new(HashingEmbeddingProvider::new(config.embedding_dimension))
            }
        };

        let repository: Arc<dyn DedupRepository> =
            Arc::new(TransactionalDedupRepository::new(runner));

        Ok(Self::with_collaborators(
            config.clone(),
            repository,
            Arc::new(PlainTextParser::new()),
            Arc::new(RecursiveChunker::new(config.chunk_size)),
            embedding_provider,
        ))
    }

    pub fn with_collaborators(
        config: AppConfig,
        repository: Arc<dyn DedupRepository>,
        document_parser: Arc<dyn DocumentParser>,
        chunker: Arc<dyn Chunker>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let embedding_service = Arc::new(EmbeddingService::new(
            embedding_provider.clone(),
            config.embedding_batch_size,
        ));

        let ingest_file_use_case = Arc::new(
            IngestFileUseCase::new(
                repository.clone(),
                document_parser,
                chunker,
                embedding_service.clone(),
            )
            .with_max_attempts(config.ingest_max_attempts),
        );
        let delete_file_use_case = Arc::new(
            DeleteFileUseCase::new(repository.clone()).with_max_attempts(config.ingest_max_attempts),
        );
        let get_file_use_case = Arc::new(GetFileUseCase::new(repository.clone()));
        let get_file_chunks_use_case = Arc::new(GetFileChunksUseCase::new(repository.clone()));
        let list_files_use_case = Arc::new(ListFilesUseCase::new(repository.clone()));
        let search_content_use_case = Arc::new(SearchContentUseCase::new(
            repository.clone(),
            embedding_service.embedding_dimension(),
        ));
        let store_stats_use_case = Arc::new(GetStoreStatsUseCase::new(repository.clone()));

        let file_handler = Arc::new(FileHandler::new(
            ingest_file_use_case.clone(),
            delete_file_use_case.clone(),
            get_file_use_case.clone(),
            get_file_chunks_use_case.clone(),
            list_files_use_case.clone(),
            store_stats_use_case.clone(),
        ));
        let search_handler = Arc::new(SearchHandler::new(
            search_content_use_case.clone(),
            embedding_service.clone(),
        ));

        Self {
            repository,
            embedding_provider,
            embedding_service,
            ingest_file_use_case,
            delete_file_use_case,
            get_file_use_case,
            get_file_chunks_use_case,
            list_files_use_case,
            search_content_use_case,
            store_stats_use_case,
            file_handler,
            search_handler,
            config,
        }
    }

    pub fn create_http_server(&self) -> HttpServer {
        HttpServer::new(
            self.file_handler.clone(),
            self.search_handler.clone(),
            self.config.max_upload_bytes,
            self.config.port,
        )
    }
}
