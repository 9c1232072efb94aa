use crate::tokenizer::{count_words, TokenCounter};

use super::types::MarkdownChunk;
use super::wrap::{unwrap_chunk_text, wrap_chunk_text};

pub fn overlap_marker(source_chunk_id: &str) -> String {
    format!("<!-- overlap-from-previous chunk={source_chunk_id} -->")
}

/// Prepend the last `overlap_tokens` words of each chunk to the chunk after it.
///
/// Tails are taken from the packed bodies before any stitching, so overlap never
/// carries text more than one chunk forward.
pub fn stitch_overlap(
    chunks: Vec<MarkdownChunk>,
    overlap_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<MarkdownChunk> {
    if overlap_tokens == 0 || chunks.len() < 2 {
        return chunks;
    }
    let total = chunks.len();
    let tails: Vec<(String, String)> = chunks
        .iter()
        .map(|c| (c.chunk_id.clone(), extract_overlap_text(&c.text, overlap_tokens)))
        .collect();

    let mut out = Vec::with_capacity(total);
    let mut prev_tail: Option<&(String, String)> = None;
    for (chunk, tail) in chunks.into_iter().zip(tails.iter()) {
        let stitched = match prev_tail {
            Some((source_id, overlap)) if !overlap.is_empty() => {
                let body = unwrap_chunk_text(&chunk.text);
                let combined = format!("{}\n{}\n\n{}", overlap_marker(source_id), overlap, body)
                    .trim()
                    .to_string();
                let token_count = counter.count_tokens(&combined);
                MarkdownChunk {
                    text: wrap_chunk_text(&chunk.chunk_id, chunk.index, total, &combined),
                    token_count,
                    word_count: count_words(&combined),
                    overlap_from_previous_tokens: overlap_tokens.min(token_count),
                    ..chunk
                }
            }
            _ => chunk,
        };
        out.push(stitched);
        prev_tail = Some(tail);
    }
    out
}

/// Last `desired` whitespace-separated words of the unwrapped body; words stand in for tokens.
pub fn extract_overlap_text(text: &str, desired: usize) -> String {
    if desired == 0 {
        return String::new();
    }
    let body = unwrap_chunk_text(text);
    let words: Vec<&str> = body.split_whitespace().collect();
    let take = desired.min(words.len());
    words[words.len() - take..].join(" ")
}
