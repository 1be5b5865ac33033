use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} is required")]
    Missing { key: &'static str },
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingsBackend {
    /// Remote inference service over HTTP.
    Http,
    /// Local deterministic feature hashing; no network.
    Hashing,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_pool_size: u32,
    pub snapshot_path: Option<PathBuf>,
    pub embeddings_backend: EmbeddingsBackend,
    pub embeddings_service_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub embedding_batch_size: usize,
    pub embedding_max_retries: u32,
    pub embedding_timeout_secs: u64,
    pub chunk_size: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub ingest_max_attempts: usize,
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_backend = match get("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let embeddings_backend = match get("EMBEDDINGS_PROVIDER").as_deref() {
            None | Some("http") => EmbeddingsBackend::Http,
            Some("hashing") => EmbeddingsBackend::Hashing,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDINGS_PROVIDER",
                    value: other.to_string(),
                });
            }
        };

        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing { key: "DATABASE_URL" });
        }

        Ok(Self {
            store_backend,
            database_url,
            database_pool_size: parse_or(&get, "DATABASE_POOL_SIZE", 10)?,
            snapshot_path: get("STORE_SNAPSHOT_PATH").map(PathBuf::from),
            embeddings_backend,
            embeddings_service_url: get("EMBEDDINGS_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:8080/embed".to_string()),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "default".to_string()),
            embedding_dimension: positive(&get, "EMBEDDING_DIMENSION", 1536)?,
            embedding_batch_size: positive(&get, "EMBEDDING_BATCH_SIZE", 10)?,
            embedding_max_retries: parse_or(&get, "EMBEDDING_MAX_RETRIES", 3)?,
            embedding_timeout_secs: parse_or(&get, "EMBEDDING_TIMEOUT_SECS", 30)?,
            chunk_size: positive(&get, "CHUNK_SIZE", 1000)?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 250 * 1024 * 1024)?,
            port: parse_or(&get, "PORT", 3000)?,
            ingest_max_attempts: positive(&get, "INGEST_MAX_ATTEMPTS", 3)?,
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn positive(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_or(get, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        });
    }
    Ok(value)
}
