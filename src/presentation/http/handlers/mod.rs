pub mod file_handler;
pub mod search_handler;

pub use file_handler::FileHandler;
pub use search_handler::SearchHandler;
