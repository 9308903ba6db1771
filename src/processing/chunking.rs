//! Character-offset chunking with boundary snapping.
//!
//! Splitting walks the text left to right. Each step proposes a cut `size`
//! characters ahead, then snaps it backward to the nearest paragraph break,
//! sentence end, or space inside the window, falling back to a hard cut when
//! the window contains none. The next chunk starts `overlap` characters
//! before the cut so adjacent chunks share context around the boundary.
//!
//! A forward-progress guard forces the next start past the previous one, so
//! the walk terminates even on pathological inputs (no whitespace at all, or
//! an overlap as large as the chunk itself).

use super::types::{Chunk, ChunkingError};

/// Split `text` into ordered, overlapping chunks tagged with `source`.
///
/// `size` and `overlap` are measured in characters; callers are expected to
/// keep `overlap` below `size`. Returns an empty vector for empty input.
/// Every character of the input is covered by at least one chunk.
pub fn chunk_text(
    text: &str,
    size: usize,
    overlap: usize,
    source: &str,
) -> Result<Vec<Chunk>, ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain([text.len()])
        .collect();
    let total_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < total_chars {
        let end = start + size;
        if end >= total_chars {
            chunks.push(Chunk {
                index,
                offset: start,
                text: text[bounds[start]..].to_string(),
                source: source.to_string(),
            });
            break;
        }

        let window = &text[bounds[start]..bounds[end]];
        let breakpoint = match find_breakpoint(window) {
            // Map the byte offset inside the window back to a char offset.
            Some(byte_offset) => {
                let absolute = bounds[start] + byte_offset;
                bounds.partition_point(|bound| *bound < absolute)
            }
            None => end,
        };

        chunks.push(Chunk {
            index,
            offset: start,
            text: text[bounds[start]..bounds[breakpoint]].to_string(),
            source: source.to_string(),
        });
        index += 1;

        // Forward-progress guard: never revisit a start position.
        let next = breakpoint.saturating_sub(overlap);
        start = if next > start { next } else { start + 1 };
    }

    Ok(chunks)
}

/// Find the best cut point inside the window, preferring paragraph breaks,
/// then sentence ends, then plain spaces. A match at offset zero would emit
/// an empty chunk, so it counts as "not found" and the next fallback applies.
fn find_breakpoint(window: &str) -> Option<usize> {
    window
        .rfind("\n\n")
        .filter(|offset| *offset > 0)
        .or_else(|| window.rfind(". ").filter(|offset| *offset > 0))
        .or_else(|| window.rfind(' ').filter(|offset| *offset > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(text: &str, chunks: &[Chunk]) {
        assert!(!chunks.is_empty());
        let total_chars = text.chars().count();
        let mut covered_to = 0usize;
        for chunk in chunks {
            assert!(
                chunk.offset <= covered_to,
                "gap before chunk {} at offset {}",
                chunk.index,
                chunk.offset
            );
            let chunk_chars = chunk.text.chars().count();
            covered_to = covered_to.max(chunk.offset + chunk_chars);
            // The chunk text must be the literal span at its offset.
            let span: String = text
                .chars()
                .skip(chunk.offset)
                .take(chunk_chars)
                .collect();
            assert_eq!(span, chunk.text);
        }
        assert_eq!(covered_to, total_chars, "input not fully covered");
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunks = chunk_text("hello world", 100, 20, "doc.txt").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].source, "doc.txt");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = chunk_text("", 100, 20, "doc.txt").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        let error = chunk_text("hello", 0, 0, "doc.txt").unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(50), "b".repeat(50));
        let chunks = chunk_text(&text, 80, 10, "doc.txt").unwrap();
        assert!(chunks[0].text.ends_with('a'));
        assert_covers(&text, &chunks);
    }

    #[test]
    fn falls_back_to_sentence_then_space() {
        let text = format!("{}. {}", "word ".repeat(30).trim_end(), "tail ".repeat(30));
        let chunks = chunk_text(&text, 100, 20, "doc.txt").unwrap();
        assert!(chunks.len() >= 2);
        assert_covers(&text, &chunks);
    }

    #[test]
    fn hard_cuts_text_without_whitespace() {
        let text = "x".repeat(5000);
        let size = 1000;
        let overlap = 200;
        let chunks = chunk_text(&text, size, overlap, "doc.txt").unwrap();
        // Progress is size - overlap per step, so the step bound holds.
        let bound = text.len().div_ceil(size - overlap) + 1;
        assert!(chunks.len() <= bound, "{} chunks > bound {}", chunks.len(), bound);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.text.chars().count(), size);
        }
        assert_covers(&text, &chunks);
    }

    #[test]
    fn terminates_when_overlap_equals_size() {
        // Guard kicks in: every breakpoint minus overlap lands at or before
        // the previous start, forcing one-character steps rather than a hang.
        let text = "abcdefghij";
        let chunks = chunk_text(text, 4, 4, "doc.txt").unwrap();
        assert_covers(text, &chunks);
        assert!(chunks.len() <= text.len());
    }

    #[test]
    fn indices_are_strictly_increasing() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 100, 20, "doc.txt").unwrap();
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
    }

    #[test]
    fn consecutive_chunks_share_an_overlap() {
        let text = "sentence one here. ".repeat(300);
        let chunks = chunk_text(&text, 1000, 200, "doc.txt").unwrap();
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let previous_end = pair[0].offset + pair[0].text.chars().count();
            assert!(
                pair[1].offset < previous_end,
                "chunks {} and {} do not overlap",
                pair[0].index,
                pair[1].index
            );
        }
        assert_covers(&text, &chunks);
    }

    #[test]
    fn five_thousand_char_document_scenario() {
        // ~5k chars with natural sentence boundaries: expect a handful of
        // chunks, each within the size budget except possibly via overlap.
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(109);
        let text = &text[..text.len().min(5000)];
        let chunks = chunk_text(text, 1000, 200, "doc.txt").unwrap();
        assert!(
            (5..=8).contains(&chunks.len()),
            "unexpected chunk count {}",
            chunks.len()
        );
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
        assert_covers(text, &chunks);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "héllo wörld. ".repeat(100);
        let chunks = chunk_text(&text, 50, 10, "doc.txt").unwrap();
        assert_covers(&text, &chunks);
    }
}
