use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("hash must be 64 characters long (SHA-256), got {0}")]
    InvalidLength(usize),
    #[error("hash must contain only hexadecimal characters")]
    InvalidCharacters,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn validate_hex(hash: String) -> Result<String, HashError> {
    if hash.len() != 64 {
        return Err(HashError::InvalidLength(hash.len()));
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HashError::InvalidCharacters);
    }

    Ok(hash.to_lowercase())
}

/// Identity of a whole uploaded blob: SHA-256 of the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: String) -> Result<Self, HashError> {
        validate_hex(hash).map(Self)
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self(sha256_hex(data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of one chunk: SHA-256 of its UTF-8 text and nothing else, so the
/// same text hashes identically wherever it appears.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkHash(String);

impl ChunkHash {
    pub fn new(hash: String) -> Result<Self, HashError> {
        validate_hex(hash).map(Self)
    }

    pub fn from_text(text: &str) -> Self {
        Self(sha256_hex(text.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_hash_conversions {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$ty> for String {
            fn from(hash: $ty) -> Self {
                hash.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = HashError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

impl_hash_conversions!(ContentHash);
impl_hash_conversions!(ChunkHash);

/// `contentHash(bytes)`.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    ContentHash::from_bytes(bytes)
}

/// `chunkHash(text)`.
pub fn chunk_hash(text: &str) -> ChunkHash {
    ChunkHash::from_text(text)
}
