pub mod chunk_association_model;
pub mod file_model;
pub mod global_chunk_model;
pub mod global_file_model;

pub use chunk_association_model::ChunkAssociationModel;
pub use file_model::FileModel;
pub use global_chunk_model::GlobalChunkModel;
pub use global_file_model::GlobalFileModel;
