use qfs_llm::{chunk_text, split_paragraphs};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default longest passage, in bytes
pub const DEFAULT_PASSAGE_MAX_CHARS: usize = 1200;

/// Position of a passage inside the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Passage index in document order
    pub passage: usize,

    /// Start byte offset in the document text
    pub start: usize,

    /// End byte offset in the document text (exclusive)
    pub end: usize,
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "passage {} @ {}..{}", self.passage, self.start, self.end)
    }
}

/// A segment of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPassage {
    pub locator: SourceLocator,
    pub text: String,
}

/// Read-only view of the source document, segmented once before a run
#[derive(Debug, Clone)]
pub struct DocumentView {
    text: String,
    passages: Vec<DocumentPassage>,
}

impl DocumentView {
    /// Segment `text` into passages of at most `DEFAULT_PASSAGE_MAX_CHARS`
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_passage_limit(text, DEFAULT_PASSAGE_MAX_CHARS)
    }

    /// Segment at blank lines, splitting longer paragraphs at sentence boundaries
    pub fn with_passage_limit(text: impl Into<String>, max_chars: usize) -> Self {
        let text = text.into();
        let mut passages = Vec::new();

        for paragraph in split_paragraphs(&text) {
            for chunk in chunk_text(&paragraph.text, max_chars) {
                let piece = chunk.text.trim();
                if piece.is_empty() {
                    continue;
                }
                let leading = chunk.text.len() - chunk.text.trim_start().len();
                let start = paragraph.start + chunk.start + leading;
                passages.push(DocumentPassage {
                    locator: SourceLocator {
                        passage: passages.len(),
                        start,
                        end: start + piece.len(),
                    },
                    text: piece.to_string(),
                });
            }
        }

        Self { text, passages }
    }

    /// Full document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Passages in document order
    pub fn passages(&self) -> &[DocumentPassage] {
        &self.passages
    }

    /// True when the document has no content after trimming
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_passages() {
        let text = "Intro line.\n\nSecond paragraph here.\n\n\nThird.";
        let doc = DocumentView::new(text);

        let texts: Vec<&str> = doc.passages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Intro line.", "Second paragraph here.", "Third."]);
        for (i, passage) in doc.passages().iter().enumerate() {
            assert_eq!(passage.locator.passage, i);
            assert_eq!(&text[passage.locator.start..passage.locator.end], passage.text);
        }
    }

    #[test]
    fn test_long_paragraph_is_split() {
        let paragraph = "Alpha beta gamma. ".repeat(20);
        let text = format!("Title\n\n{}", paragraph);
        let doc = DocumentView::with_passage_limit(text.clone(), 60);

        assert!(doc.passages().len() > 2);
        for passage in doc.passages() {
            assert!(passage.text.len() <= 60);
            assert_eq!(&text[passage.locator.start..passage.locator.end], passage.text);
        }
    }

    #[test]
    fn test_windows_line_endings_separate_passages() {
        let text = "Givat Ram hosts science.\r\n\r\nMount Scopus hosts humanities.\r\n \r\nRehovot hosts agriculture.\r\n";
        let doc = DocumentView::new(text);

        let texts: Vec<&str> = doc.passages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Givat Ram hosts science.",
                "Mount Scopus hosts humanities.",
                "Rehovot hosts agriculture."
            ]
        );
        for passage in doc.passages() {
            assert_eq!(&text[passage.locator.start..passage.locator.end], passage.text);
        }
    }

    #[test]
    fn test_whitespace_document_is_empty() {
        let doc = DocumentView::new(" \n\n\t ");
        assert!(doc.is_empty());
        assert!(doc.passages().is_empty());
    }

    #[test]
    fn test_locator_display() {
        let locator = SourceLocator { passage: 3, start: 10, end: 42 };
        assert_eq!(locator.to_string(), "passage 3 @ 10..42");
    }
}
