//! Recursive character text splitting
//!
//! Splits document text into fixed-size overlapping chunks, preferring to
//! break on paragraph, line, sentence, then word boundaries so that chunks
//! stay semantically coherent.

/// Separators tried in order of preference when looking for a break point
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `overlap` characters carried over between adjacent chunks.
///
/// Boundaries are chosen on the last matching separator within the window;
/// if no separator fits, the chunk is cut at the size limit. Whitespace-only
/// chunks are dropped.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let window_end = (start + chunk_size).min(chars.len());
        let end = if window_end == chars.len() {
            window_end
        } else {
            find_break(&chars, start, window_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk.trim().to_string());
        }

        if end == chars.len() {
            break;
        }
        // Step forward, keeping `overlap` characters of context
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Find the best break position in `chars[start..limit]`, preferring the
/// latest occurrence of the strongest separator.
fn find_break(chars: &[char], start: usize, limit: usize) -> usize {
    let window: String = chars[start..limit].iter().collect();

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let char_pos = window[..pos].chars().count() + sep.chars().count();
            // Reject breaks too close to the window start; a tiny chunk
            // followed by an overlap step would fail to make progress.
            if char_pos > (limit - start) / 4 {
                return start + char_pos;
            }
        }
    }

    limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello world.", 1000, 200);
        assert_eq!(chunks, vec!["Hello world.".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("   \n\n  ", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "word ".repeat(500);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split_text(&text, 100, 10);
        assert_eq!(chunks[0], "a".repeat(60));
    }

    #[test]
    fn test_overlap_carries_context() {
        let text = "The first law concerns energy. The second law concerns entropy. \
                    The third law concerns absolute zero. Systems exchange heat and work."
            .repeat(4);
        let chunks = split_text(&text, 120, 40);
        assert!(chunks.len() >= 2);
        // Adjacent chunks share text because of the overlap window
        let tail: String = chunks[0].chars().rev().take(20).collect();
        let tail: String = tail.chars().rev().collect();
        assert!(
            chunks[1].contains(tail.trim()) || chunks[1].len() < 40,
            "expected overlap between chunks"
        );
    }

    #[test]
    fn test_progress_on_unbroken_text() {
        // No separators at all: chunks are hard cut but always advance
        let text = "x".repeat(5000);
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks.len() >= 5);
    }
}
