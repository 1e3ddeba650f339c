/// Text chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text
    pub text: String,

    /// Start byte offset in original text
    pub start: usize,

    /// End byte offset in original text (exclusive)
    pub end: usize,
}

/// Split text into contiguous chunks of at most `max_chars` bytes, preferring
/// sentence boundaries.
///
/// Offsets are byte offsets into `text` and always fall on char boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);
    let text_len = text.len();

    if text_len <= max_chars {
        return vec![TextChunk {
            text: text.to_string(),
            start: 0,
            end: text_len,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text_len {
        let mut end = floor_char_boundary(text, (start + max_chars).min(text_len));
        if end <= start {
            // A single char wider than max_chars still has to make progress
            end = ceil_char_boundary(text, start + 1);
        }

        let actual_end = if end < text_len {
            find_break_point(text, start, end)
        } else {
            end
        };

        chunks.push(TextChunk {
            text: text[start..actual_end].to_string(),
            start,
            end: actual_end,
        });

        start = actual_end;
    }

    chunks
}

/// Find a good breaking point (sentence boundary)
fn find_break_point(text: &str, start: usize, ideal_end: usize) -> usize {
    // Look for sentence endings within the last 20% of the chunk
    let search_start = ceil_char_boundary(text, start + ((ideal_end - start) * 80 / 100));
    if search_start >= ideal_end {
        return ideal_end;
    }
    let search_text = &text[search_start..ideal_end];

    let sentence_endings = [". ", ".\n", "! ", "!\n", "? ", "?\n", "。", "！", "？"];

    let mut best_pos = None;
    for ending in &sentence_endings {
        if let Some(idx) = search_text.rfind(ending) {
            let pos = search_start + idx + ending.len();
            if best_pos.map_or(true, |best| pos > best) {
                best_pos = Some(pos);
            }
        }
    }

    best_pos.unwrap_or(ideal_end)
}

/// Split text by paragraphs, keeping offsets of the trimmed text
///
/// A paragraph ends at any line that is empty or whitespace only, so `\r\n`
/// line endings and indented blank lines separate paragraphs too.
pub fn split_paragraphs(text: &str) -> Vec<TextChunk> {
    let mut paragraphs = Vec::new();
    // (start, end) of the paragraph being collected
    let mut current: Option<(usize, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let content = line.trim();
        if content.is_empty() {
            if let Some((start, end)) = current.take() {
                paragraphs.push(paragraph(text, start, end));
            }
            continue;
        }

        let leading = line.len() - line.trim_start().len();
        let end = line_start + line.trim_end().len();
        current = Some(match current {
            Some((start, _)) => (start, end),
            None => (line_start + leading, end),
        });
    }

    if let Some((start, end)) = current {
        paragraphs.push(paragraph(text, start, end));
    }

    paragraphs
}

fn paragraph(text: &str, start: usize, end: usize) -> TextChunk {
    TextChunk {
        text: text[start..end].to_string(),
        start,
        end,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
