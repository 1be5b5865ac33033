use async_trait::async_trait;

use crate::application::ports::document_parser::{
    DocumentParseError, DocumentParser, ParsedDocument,
};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "log", "json", "rst"];

/// Strict UTF-8 text parser. Form feeds mark page boundaries.
#[derive(Debug, Clone, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument, DocumentParseError> {
        if !self.can_parse(filename) {
            return Err(DocumentParseError::UnsupportedFormat(filename.to_string()));
        }

        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

        let text = std::str::from_utf8(data).map_err(|e| {
            DocumentParseError::CorruptedFile(format!(
                "{} is not valid UTF-8 (byte {})",
                filename,
                e.valid_up_to()
            ))
        })?;

        if text.trim().is_empty() {
            return Err(DocumentParseError::EmptyDocument(filename.to_string()));
        }

        let page_count = text.matches('\x0c').count() as i32 + 1;

        Ok(ParsedDocument {
            text: text.replace("\r\n", "\n"),
            page_count: Some(page_count),
        })
    }

    fn can_parse(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, extension)) => SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str()),
            None => true,
        }
    }
}
