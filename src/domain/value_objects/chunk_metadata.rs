use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkContentType {
    #[default]
    Text,
    Heading,
    Code,
    Table,
    List,
}

impl ChunkContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkContentType::Text => "text",
            ChunkContentType::Heading => "heading",
            ChunkContentType::Code => "code",
            ChunkContentType::Table => "table",
            ChunkContentType::List => "list",
        }
    }
}

/// Positional context of a chunk inside one particular file. Lives on the
/// association, never on the chunk, because the same text can sit under
/// different headings in different documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<String>,
    #[serde(default)]
    pub content_type: ChunkContentType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_number(mut self, page_number: i32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_breadcrumbs(mut self, breadcrumbs: Vec<String>) -> Self {
        self.breadcrumbs = breadcrumbs;
        self
    }

    pub fn with_content_type(mut self, content_type: ChunkContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_property(mut self, key: String, value: serde_json::Value) -> Self {
        self.extra.insert(key, value);
        self
    }

    pub fn breadcrumb_path(&self) -> Option<String> {
        if self.breadcrumbs.is_empty() {
            None
        } else {
            Some(self.breadcrumbs.join(" > "))
        }
    }
}

impl From<&ChunkMetadata> for serde_json::Value {
    fn from(metadata: &ChunkMetadata) -> Self {
        serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null)
    }
}

impl TryFrom<serde_json::Value> for ChunkMetadata {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(ChunkMetadata::default()),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| format!("Invalid chunk metadata: {}", e)),
            _ => Err("Chunk metadata must be a JSON object".to_string()),
        }
    }
}
