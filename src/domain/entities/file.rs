use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::ContentHash;

/// A user's pointer to a piece of global content. The only row a user
/// creates or deletes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    id: Uuid,
    user_id: String,
    filename: String,
    content_hash: ContentHash,
    created_at: DateTime<Utc>,
}

impl File {
    pub fn new(user_id: String, filename: String, content_hash: ContentHash) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            filename,
            content_hash,
            created_at: Utc::now(),
        }
    }

    pub fn restore(
        id: Uuid,
        user_id: String,
        filename: String,
        content_hash: ContentHash,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            filename,
            content_hash,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// A user's pointer joined with the size of the content it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub file: File,
    pub size: i64,
    pub chunk_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_pointer_creation() {
        let hash = ContentHash::from_bytes(b"hello world");
        let file = File::new("user1".to_string(), "notes.txt".to_string(), hash.clone());

        assert_eq!(file.filename(), "notes.txt");
        assert_eq!(file.content_hash(), &hash);
        assert!(file.is_owned_by("user1"));
        assert!(!file.is_owned_by("user2"));
    }

    #[test]
    fn test_pointers_to_same_content_are_distinct() {
        let hash = ContentHash::from_bytes(b"same");
        let a = File::new("user1".to_string(), "a.txt".to_string(), hash.clone());
        let b = File::new("user1".to_string(), "b.txt".to_string(), hash);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
