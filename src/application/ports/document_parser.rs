use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentParseError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),
    #[error("Empty document: {0}")]
    EmptyDocument(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub text: String,
    pub page_count: Option<i32>,
}

/// Turns raw upload bytes into text. Runs before any write, so a failure
/// here leaves the store untouched.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument, DocumentParseError>;

    fn can_parse(&self, filename: &str) -> bool;
}
