pub mod memory_store;
pub mod snapshot;

pub use memory_store::InMemoryStore;
