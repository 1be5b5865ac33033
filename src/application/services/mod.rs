pub mod embedding_service;

pub use embedding_service::{EmbeddingFailure, EmbeddingOutcome, EmbeddingService};
