pub mod dedup_repository;
pub mod store_transaction;

pub use dedup_repository::{DedupRepository, TransactionalDedupRepository};
pub use store_transaction::{RowLock, StoreError, StoreResult, StoreTransaction, TransactionRunner};
