pub mod hashing_embedding_provider;
pub mod inference_client;
pub mod plain_text_parser;
pub mod recursive_chunker;

pub use hashing_embedding_provider::HashingEmbeddingProvider;
pub use inference_client::{EmbeddingsClientConfig, InferenceClient, InferenceEmbeddingProvider};
pub use plain_text_parser::PlainTextParser;
pub use recursive_chunker::RecursiveChunker;
