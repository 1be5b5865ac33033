pub mod chunk_association;
pub mod file;
pub mod global_chunk;
pub mod global_file;
pub mod search_result;

pub use chunk_association::ChunkAssociation;
pub use file::{File, FileDetails};
pub use global_chunk::GlobalChunk;
pub use global_file::GlobalFile;
pub use search_result::{ChunkSearchHit, FileChunk, StoreStats};
