use crate::application::ports::chunker::{ChunkCandidate, Chunker};
use crate::application::ports::document_parser::ParsedDocument;
use crate::domain::value_objects::{ChunkContentType, ChunkMetadata};

pub trait RecursiveTextSplitter {
    fn split_text(&self, text: &str, max_chunk_size: usize) -> Vec<String>;
}

/// Splits on paragraphs, then lines, then words, then characters, packing
/// pieces up to `max_chunk_size` characters.
#[derive(Debug, Clone)]
pub struct RTSplitter {
    separators: Vec<&'static str>,
}

impl Default for RTSplitter {
    fn default() -> Self {
        Self {
            separators: vec!["\n\n", "\n", " ", ""],
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

impl RecursiveTextSplitter for RTSplitter {
    fn split_text(&self, text: &str, max_chunk_size: usize) -> Vec<String> {
        let max_chunk_size = max_chunk_size.max(1);
        if char_len(text) <= max_chunk_size {
            return vec![text.to_string()];
        }

        self.recursive_split(text, max_chunk_size, 0)
    }
}

impl RTSplitter {
    fn split_by_length(&self, text: &str, max_chunk_size: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(max_chunk_size)
            .map(|piece| piece.iter().collect())
            .collect()
    }

    fn recursive_split(&self, text: &str, max_chunk_size: usize, separator_index: usize) -> Vec<String> {
        if char_len(text) <= max_chunk_size {
            return vec![text.to_string()];
        }

        let separator = match self.separators.get(separator_index) {
            Some(separator) if !separator.is_empty() => *separator,
            _ => return self.split_by_length(text, max_chunk_size),
        };

        let parts: Vec<&str> = text.split(separator).collect();
        if parts.len() == 1 {
            return self.recursive_split(text, max_chunk_size, separator_index + 1);
        }

        let mut chunks = Vec::new();
        let mut current_chunk = String::new();

        for part in parts {
            let candidate = if current_chunk.is_empty() {
                part.to_string()
            } else {
                format!("{}{}{}", current_chunk, separator, part)
            };

            if char_len(&candidate) <= max_chunk_size {
                current_chunk = candidate;
                continue;
            }

            if !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }
            current_chunk = part.to_string();

            if char_len(&current_chunk) > max_chunk_size {
                chunks.extend(self.recursive_split(&current_chunk, max_chunk_size, separator_index + 1));
                current_chunk.clear();
            }
        }

        if !current_chunk.is_empty() {
            chunks.push(current_chunk);
        }

        chunks
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    text: String,
    content_type: ChunkContentType,
    breadcrumbs: Vec<String>,
}

/// Walks markdown-ish text line by line and cuts it into paragraphs, fenced
/// code, pipe tables and headings, remembering the heading path each block
/// sits under.
#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    headings: Vec<(usize, String)>,
    paragraph: Vec<String>,
    table: Vec<String>,
    code: Option<Vec<String>>,
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }

    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }

    let title = rest.trim().trim_end_matches('#').trim();
    if title.is_empty() {
        None
    } else {
        Some((level, title.to_string()))
    }
}

fn is_list_item(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("+ ") {
        return true;
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && (line[digits..].starts_with(". ") || line[digits..].starts_with(") "))
}

impl BlockCollector {
    fn breadcrumbs(&self) -> Vec<String> {
        self.headings.iter().map(|(_, title)| title.clone()).collect()
    }

    fn emit(&mut self, lines: Vec<String>, content_type: ChunkContentType) {
        let text = lines.join("\n");
        if text.trim().is_empty() {
            return;
        }

        let breadcrumbs = self.breadcrumbs();
        self.blocks.push(Block {
            text,
            content_type,
            breadcrumbs,
        });
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }

        let lines = std::mem::take(&mut self.paragraph);
        let content_type = if lines.iter().all(|l| is_list_item(l)) {
            ChunkContentType::List
        } else {
            ChunkContentType::Text
        };
        self.emit(lines, content_type);
    }

    fn flush_table(&mut self) {
        if !self.table.is_empty() {
            let lines = std::mem::take(&mut self.table);
            self.emit(lines, ChunkContentType::Table);
        }
    }

    fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();

        if let Some(code) = self.code.as_mut() {
            code.push(line.to_string());
            if trimmed.starts_with("```") {
                if let Some(lines) = self.code.take() {
                    self.emit(lines, ChunkContentType::Code);
                }
            }
            return;
        }

        if trimmed.starts_with("```") {
            self.flush_paragraph();
            self.flush_table();
            self.code = Some(vec![line.to_string()]);
            return;
        }

        if let Some((level, title)) = parse_heading(trimmed) {
            self.flush_paragraph();
            self.flush_table();
            self.headings.retain(|(existing, _)| *existing < level);
            self.headings.push((level, title));
            self.emit(vec![trimmed.to_string()], ChunkContentType::Heading);
            return;
        }

        if trimmed.starts_with('|') {
            self.flush_paragraph();
            self.table.push(line.to_string());
            return;
        }
        self.flush_table();

        if trimmed.is_empty() {
            self.flush_paragraph();
        } else {
            self.paragraph.push(line.to_string());
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(lines) = self.code.take() {
            self.emit(lines, ChunkContentType::Code);
        }
        self.flush_table();
        self.flush_paragraph();
        self.blocks
    }
}

fn split_blocks(text: &str) -> Vec<Block> {
    let mut collector = BlockCollector::default();
    for line in text.lines() {
        collector.push_line(line);
    }
    collector.finish()
}

/// Default chunker. Each paragraph, heading, table or code block becomes its
/// own chunk unless it exceeds `chunk_size` characters, in which case it is
/// split recursively. Pieces are trimmed so the same paragraph yields the
/// same text, and therefore the same chunk hash, wherever it appears.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    splitter: RTSplitter,
    chunk_size: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            splitter: RTSplitter::default(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &ParsedDocument) -> Vec<ChunkCandidate> {
        let paged = document.page_count.unwrap_or(1) > 1;
        let mut candidates = Vec::new();

        for (page_index, page) in document.text.split('\x0c').enumerate() {
            for block in split_blocks(page) {
                for piece in self.splitter.split_text(&block.text, self.chunk_size) {
                    let piece = piece.trim();
                    if piece.is_empty() {
                        continue;
                    }

                    let mut metadata = ChunkMetadata::new()
                        .with_content_type(block.content_type)
                        .with_breadcrumbs(block.breadcrumbs.clone());
                    if let Some(heading) = block.breadcrumbs.last() {
                        metadata = metadata.with_heading(heading.clone());
                    }
                    if paged {
                        metadata = metadata.with_page_number(page_index as i32 + 1);
                    }

                    candidates.push(ChunkCandidate::new(piece, metadata));
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(text: &str) -> ParsedDocument {
        ParsedDocument {
            text: text.to_string(),
            page_count: Some(text.matches('\x0c').count() as i32 + 1),
        }
    }

    #[test]
    fn test_basic_splitting() {
        let splitter = RTSplitter::default();
        let text = "This is a test.\n\nThis is another paragraph.\n\nAnd a third one.";
        let chunks = splitter.split_text(text, 30);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 30);
        }
    }

    #[test]
    fn test_character_split_reconstructs_text() {
        let splitter = RTSplitter::default();
        let text = "ÄÖÜäöüßÄÖÜäöüßÄÖÜäöüß";
        let chunks = splitter.split_text(text, 8);

        assert!(chunks.iter().all(|c| char_len(c) <= 8));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_short_text() {
        let splitter = RTSplitter::default();
        assert_eq!(splitter.split_text("Short text", 100), vec!["Short text"]);
    }

    #[test]
    fn test_paragraphs_become_separate_chunks() {
        let chunker = RecursiveChunker::new(1000);
        let chunks = chunker.chunk(&document("First paragraph.\n\n  Second paragraph.  \n"));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First paragraph.", "Second paragraph."]);
        assert_eq!(chunks[0].metadata.content_type, ChunkContentType::Text);
    }

    #[test]
    fn test_headings_build_breadcrumbs() {
        let chunker = RecursiveChunker::new(1000);
        let text = "# Terms\n\nIntro.\n\n## Billing\n\nPay on time.\n\n# Appendix\n\nExtra.";
        let chunks = chunker.chunk(&document(text));

        let billing = chunks.iter().find(|c| c.text == "Pay on time.").unwrap();
        assert_eq!(billing.metadata.heading.as_deref(), Some("Billing"));
        assert_eq!(billing.metadata.breadcrumb_path().unwrap(), "Terms > Billing");

        let extra = chunks.iter().find(|c| c.text == "Extra.").unwrap();
        assert_eq!(extra.metadata.breadcrumbs, vec!["Appendix".to_string()]);

        let heading = chunks.iter().find(|c| c.text == "## Billing").unwrap();
        assert_eq!(heading.metadata.content_type, ChunkContentType::Heading);
    }

    #[test]
    fn test_code_tables_and_lists_are_tagged() {
        let chunker = RecursiveChunker::new(1000);
        let text = "```rust\nfn main() {}\n\nlet x = 1;\n```\n| a | b |\n|---|---|\n| 1 | 2 |\n\n- one\n- two";
        let chunks = chunker.chunk(&document(text));

        let types: Vec<ChunkContentType> = chunks.iter().map(|c| c.metadata.content_type).collect();
        assert_eq!(
            types,
            vec![
                ChunkContentType::Code,
                ChunkContentType::Table,
                ChunkContentType::List
            ]
        );
        assert!(chunks[0].text.contains("let x = 1;"));
    }

    #[test]
    fn test_form_feeds_set_page_numbers() {
        let chunker = RecursiveChunker::new(1000);
        let chunks = chunker.chunk(&document("Page one.\x0cPage two."));

        assert_eq!(chunks[0].metadata.page_number, Some(1));
        assert_eq!(chunks[1].metadata.page_number, Some(2));
    }

    #[test]
    fn test_repeated_boilerplate_has_identical_text() {
        let chunker = RecursiveChunker::new(1000);
        let a = chunker.chunk(&document("# A\n\nConfidential.\n\nAlpha body."));
        let b = chunker.chunk(&document("Beta body.\n\n   Confidential.   "));

        assert!(a.iter().any(|c| c.text == "Confidential."));
        assert!(b.iter().any(|c| c.text == "Confidential."));
    }

    #[test]
    fn test_long_paragraph_respects_chunk_size() {
        let chunker = RecursiveChunker::new(20);
        let chunks = chunker.chunk(&document("word ".repeat(30).trim()));

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| char_len(&c.text) <= 20));
    }
}
