pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;

pub use server::HttpServer;
