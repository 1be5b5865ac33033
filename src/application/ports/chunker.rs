use crate::application::ports::document_parser::ParsedDocument;
use crate::domain::value_objects::ChunkMetadata;

/// One piece of text handed over by the chunking collaborator, in document
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl ChunkCandidate {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

pub trait Chunker: Send + Sync {
    fn chunk(&self, document: &ParsedDocument) -> Vec<ChunkCandidate>;
}
