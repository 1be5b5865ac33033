pub mod content_linker;
pub mod ingestion_writer;
pub mod orphan_collector;

pub use content_linker::link_existing_content;
pub use ingestion_writer::{IngestionPlan, PersistOutcome, persist_ingestion};
pub use orphan_collector::{DeletionOutcome, delete_and_collect};
