use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ContentHash;

/// One unique blob of file content, shared by every user who uploaded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalFile {
    hash: ContentHash,
    size: i64,
    created_at: DateTime<Utc>,
}

impl GlobalFile {
    pub fn new(hash: ContentHash, size: i64) -> Self {
        Self {
            hash,
            size,
            created_at: Utc::now(),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::new(ContentHash::from_bytes(data), data.len() as i64)
    }

    pub fn restore(hash: ContentHash, size: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            hash,
            size,
            created_at,
        }
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let file = GlobalFile::from_bytes(b"hello world");
        assert_eq!(file.size(), 11);
        assert_eq!(file.hash(), &ContentHash::from_bytes(b"hello world"));
    }
}
