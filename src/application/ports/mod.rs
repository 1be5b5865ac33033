pub mod chunker;
pub mod document_parser;
pub mod embedding_provider;

pub use chunker::{ChunkCandidate, Chunker};
pub use document_parser::{DocumentParseError, DocumentParser, ParsedDocument};
pub use embedding_provider::EmbeddingProvider;
