use serde::{Deserialize, Serialize};

/// States of a single ingestion run.
///
/// `CheckingContent -> (Linked | Parsing) -> Chunking -> CheckingChunkDupes
/// -> EmbeddingNew -> Persisting -> Done`, with `Failed` reachable from every
/// non-terminal state. `Persisting -> CheckingChunkDupes` is the retry edge
/// taken when a concurrent delete removed a row the run meant to reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    CheckingContent,
    Linked,
    Parsing,
    Chunking,
    CheckingChunkDupes,
    EmbeddingNew,
    Persisting,
    Done,
    Failed(String),
}

impl IngestionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionState::Linked | IngestionState::Done | IngestionState::Failed(_)
        )
    }

    pub fn can_transition_to(&self, next: &IngestionState) -> bool {
        use IngestionState::*;

        match (self, next) {
            (CheckingContent, Linked) | (CheckingContent, Parsing) => true,
            (Parsing, Chunking) => true,
            (Chunking, CheckingChunkDupes) => true,
            (CheckingChunkDupes, EmbeddingNew) => true,
            (EmbeddingNew, Persisting) => true,
            (Persisting, Done) => true,
            (Persisting, CheckingChunkDupes) => true,
            (current, Failed(_)) => !current.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionState::CheckingContent => "checking_content",
            IngestionState::Linked => "linked",
            IngestionState::Parsing => "parsing",
            IngestionState::Chunking => "chunking",
            IngestionState::CheckingChunkDupes => "checking_chunk_dupes",
            IngestionState::EmbeddingNew => "embedding_new",
            IngestionState::Persisting => "persisting",
            IngestionState::Done => "done",
            IngestionState::Failed(_) => "failed",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            IngestionState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl Default for IngestionState {
    fn default() -> Self {
        IngestionState::CheckingContent
    }
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome reported to the caller of `ingest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// Content was already known; only a pointer was created.
    Linked,
    /// Content was new and went through the full pipeline.
    Created,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Linked => "linked",
            IngestStatus::Created => "created",
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
