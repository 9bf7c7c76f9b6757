//! Size-bounded recursive text splitter.
//!
//! Splits a document's content into chunks of at most `chunk_size`
//! characters, where each chunk may overlap the previous one by up to
//! `chunk_overlap` characters. Boundaries prefer, in order: paragraph
//! breaks (`\n\n`), line breaks (`\n`), spaces, then a hard character
//! split.
//!
//! Chunks are verbatim slices of the original text — separators are kept
//! at the end of the left chunk — so concatenating each chunk's
//! non-overlapping suffix reproduces the document exactly.

use uuid::Uuid;

use crate::models::{Chunk, SourceDocument};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split `text` into byte spans of at most `chunk_size` characters each.
///
/// Spans satisfy: the first starts at 0, the last ends at `text.len()`,
/// each span's end strictly exceeds the previous span's end, and
/// consecutive spans overlap by up to `chunk_overlap` characters.
/// Reconstruction invariant: concatenating `text[prev_end..end]` over all
/// spans yields `text`.
pub fn split_spans(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    assert!(chunk_size >= 1, "chunk_size must be >= 1");
    assert!(
        chunk_overlap < chunk_size,
        "chunk_overlap must be < chunk_size"
    );

    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the text.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let n_chars = bounds.len() - 1;

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize; // char index
    let mut prev_end = 0usize; // char index of the previous span's end

    while start < n_chars {
        if n_chars - start <= chunk_size {
            spans.push((bounds[start], bounds[n_chars]));
            break;
        }

        let window = start + chunk_size;
        let mut end = find_boundary(text, &bounds, start, window);

        // A separator inside the overlap region could land at or before
        // the previous end; force forward progress with a hard split.
        if end <= prev_end {
            end = window;
        }

        spans.push((bounds[start], bounds[end]));
        prev_end = end;

        let mut next = end.saturating_sub(chunk_overlap);
        if next <= start {
            next = start + 1;
        }
        start = next;
    }

    spans
}

/// Pick the split point for a chunk starting at char `start`, bounded by
/// char `window` (exclusive end candidate). Prefers the last paragraph
/// break within the window, then the last line break, then the last
/// space; falls back to a hard split at the window edge.
fn find_boundary(text: &str, bounds: &[usize], start: usize, window: usize) -> usize {
    let start_b = bounds[start];
    let window_b = bounds[window];
    let slice = &text[start_b..window_b];

    for sep in SEPARATORS {
        if let Some(pos) = slice.rfind(sep) {
            let split_b = start_b + pos + sep.len();
            if split_b > start_b {
                // Separators are ASCII, so split_b is a char boundary.
                if let Ok(idx) = bounds.binary_search(&split_b) {
                    if idx > start {
                        return idx;
                    }
                }
            }
        }
    }

    window
}

/// Split text into owned chunk strings.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    split_spans(text, chunk_size, chunk_overlap)
        .into_iter()
        .map(|(s, e)| text[s..e].to_string())
        .collect()
}

/// Split a source document into chunks, each inheriting the document's
/// metadata unchanged.
pub fn split_document(doc: &SourceDocument, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(&doc.content, chunk_size, chunk_overlap)
        .into_iter()
        .map(|text| Chunk {
            id: Uuid::new_v4().to_string(),
            text,
            meta: doc.meta.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rejoin spans with overlaps stripped and compare to the original.
    fn reconstruct(text: &str, spans: &[(usize, usize)]) -> String {
        let mut out = String::new();
        let mut prev_end = 0usize;
        for &(start, end) in spans {
            let from = start.max(prev_end);
            out.push_str(&text[from..end]);
            prev_end = end;
        }
        out
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_spans("", 100, 10).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let spans = split_spans("Hello, world!", 100, 10);
        assert_eq!(spans, vec![(0, 13)]);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = "First paragraph.\n\nSecond paragraph here.";
        let chunks = split_text(text, 25, 0);
        assert_eq!(chunks[0], "First paragraph.\n\n");
        assert_eq!(chunks[1], "Second paragraph here.");
    }

    #[test]
    fn test_falls_back_to_space_boundary() {
        let text = "one two three four five six seven eight";
        let chunks = split_text(text, 12, 0);
        for c in &chunks {
            assert!(c.chars().count() <= 12, "chunk too long: {:?}", c);
        }
        // Every split lands after a space.
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.ends_with(' '), "expected space boundary: {:?}", c);
        }
    }

    #[test]
    fn test_hard_split_without_separators() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = split_text(text, 10, 0);
        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxyz"]);
    }

    #[test]
    fn test_content_preserving_across_parameters() {
        let text = "The warrior guild holds the north gate.\n\nIts members swear \
                    an oath of silence.\nRecruits train for seven years before \
                    their first patrol. The guildmaster answers only to the crown.";
        for chunk_size in [1, 5, 17, 50, 200] {
            for overlap in [0, 1, chunk_size / 2] {
                if overlap >= chunk_size {
                    continue;
                }
                let spans = split_spans(text, chunk_size, overlap);
                assert_eq!(
                    reconstruct(text, &spans),
                    text,
                    "lossy split at size={} overlap={}",
                    chunk_size,
                    overlap
                );
                for &(s, e) in &spans {
                    assert!(text[s..e].chars().count() <= chunk_size);
                }
            }
        }
    }

    #[test]
    fn test_content_preserving_multibyte() {
        let text = "Die Königin herrscht über das Tal.\n\nIhr Rabe späht von den Türmen.";
        let spans = split_spans(text, 10, 3);
        assert_eq!(reconstruct(text, &spans), text);
    }

    #[test]
    fn test_overlap_repeats_tail_of_previous_chunk() {
        let text = "aaaaabbbbbcccccdddddeeeee";
        let chunks = split_text(text, 10, 4);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            let tail: String = prev.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(next.starts_with(&tail), "missing overlap between {:?} and {:?}", prev, next);
        }
    }

    #[test]
    fn test_split_document_inherits_metadata() {
        use crate::models::{LoreMeta, Scope, SourceDocument};
        use std::path::PathBuf;

        let doc = SourceDocument {
            content: "alpha\n\nbeta\n\ngamma".to_string(),
            meta: LoreMeta {
                scope: Scope::Campaign,
                campaign: Some("ravenfall".to_string()),
                tag_name: "warrior".to_string(),
                path: PathBuf::from("/root/campaigns/ravenfall/tags/warrior.txt"),
            },
            size_bytes: 17,
            modified_at: chrono::Utc::now(),
        };
        let chunks = split_document(&doc, 8, 2);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert_eq!(c.meta, doc.meta);
            assert!(!c.id.is_empty());
        }
    }
}
