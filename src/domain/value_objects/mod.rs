pub mod chunk_metadata;
pub mod content_hash;
pub mod ingestion_state;

pub use chunk_metadata::{ChunkContentType, ChunkMetadata};
pub use content_hash::{ChunkHash, ContentHash, HashError, chunk_hash, content_hash};
pub use ingestion_state::{IngestStatus, IngestionState};
