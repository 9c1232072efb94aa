use std::path::Path;

use crate::tokenizer::{count_words, TokenCounter};

use super::types::{chunk_id_for, ContentBlock, MarkdownChunk};
use super::wrap::{unwrap_chunk_text, wrap_chunk_text};

const BLOCK_SEPARATOR: &str = "\n\n";

/// Greedy left-to-right packing. A chunk closes before a block that would push it past
/// `max_tokens`, and after a block that brings it to `target_tokens` while more blocks remain.
///
/// Running totals are counts of the joined body, separators included, so a chunk never
/// exceeds `max_tokens` under tokenizers that charge for the block separator.
///
/// Chunks come out wrapped with a provisional total (their own index); run
/// [`finalize_totals`] once the sequence is complete.
pub fn pack_blocks(
    document: &Path,
    blocks: &[ContentBlock],
    target_tokens: usize,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<MarkdownChunk> {
    let separator_tokens = counter.count_tokens(BLOCK_SEPARATOR);
    let mut chunks = Vec::new();
    let mut current: Vec<&ContentBlock> = Vec::new();
    let mut body = String::new();
    let mut current_tokens = 0usize;

    for (idx, block) in blocks.iter().enumerate() {
        let more_remain = idx + 1 < blocks.len();
        let piece = block.text.trim();

        if !current.is_empty() {
            // additive estimate first; only a candidate that may fit is recounted
            let candidate = join_piece(&body, piece);
            let fits = if current_tokens + separator_tokens + block.tokens > max_tokens {
                None
            } else {
                Some(counter.count_tokens(&candidate)).filter(|&n| n <= max_tokens)
            };
            match fits {
                Some(tokens) => {
                    current.push(block);
                    body = candidate;
                    current_tokens = tokens;
                }
                None => {
                    chunks.push(close_chunk(document, chunks.len() + 1, &current, &body, current_tokens));
                    current.clear();
                }
            }
        }

        if current.is_empty() {
            current.push(block);
            body = piece.to_string();
            current_tokens = counter.count_tokens(&body);
        }

        if current_tokens >= target_tokens && more_remain {
            chunks.push(close_chunk(document, chunks.len() + 1, &current, &body, current_tokens));
            current.clear();
        }
    }
    if !current.is_empty() {
        chunks.push(close_chunk(document, chunks.len() + 1, &current, &body, current_tokens));
    }
    chunks
}

fn join_piece(body: &str, piece: &str) -> String {
    match (body.is_empty(), piece.is_empty()) {
        (true, _) => piece.to_string(),
        (_, true) => body.to_string(),
        _ => format!("{body}{BLOCK_SEPARATOR}{piece}"),
    }
}

/// Re-wrap every chunk so its markers carry the final chunk count.
pub fn finalize_totals(chunks: Vec<MarkdownChunk>) -> Vec<MarkdownChunk> {
    let total = chunks.len();
    chunks
        .into_iter()
        .map(|chunk| {
            let body = unwrap_chunk_text(&chunk.text);
            MarkdownChunk {
                text: wrap_chunk_text(&chunk.chunk_id, chunk.index, total, &body),
                ..chunk
            }
        })
        .collect()
}

fn close_chunk(
    document: &Path,
    index: usize,
    blocks: &[&ContentBlock],
    body: &str,
    token_count: usize,
) -> MarkdownChunk {
    let chunk_id = chunk_id_for(index);

    let mut headings: Vec<String> = Vec::new();
    for heading in blocks.iter().flat_map(|b| b.heading_path.iter()) {
        if !headings.contains(heading) {
            headings.push(heading.clone());
        }
    }

    let start_line = blocks.iter().map(|b| b.start_line).min().unwrap_or(1);
    let end_line = blocks.iter().map(|b| b.end_line).max().unwrap_or(start_line);

    MarkdownChunk {
        document: document.to_path_buf(),
        text: wrap_chunk_text(&chunk_id, index, index, body),
        chunk_id,
        index,
        token_count,
        word_count: count_words(body),
        start_line,
        end_line,
        headings,
        block_count: blocks.len(),
        overlap_from_previous_tokens: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{TiktokenCounter, WordCounter};

    fn block(words: usize, line: usize, path: &[&str]) -> ContentBlock {
        let text = vec!["w"; words].join(" ");
        ContentBlock {
            text,
            start_line: line,
            end_line: line + 1,
            heading_path: path.iter().map(|s| s.to_string()).collect(),
            tokens: words,
            words,
        }
    }

    fn sizes(chunks: &[MarkdownChunk]) -> Vec<usize> {
        chunks.iter().map(|c| c.token_count).collect()
    }

    #[test]
    fn closes_at_target_when_more_blocks_remain() {
        let blocks = vec![block(6, 1, &["A"]), block(5, 3, &["A"]), block(2, 5, &["A"])];
        let chunks = pack_blocks(Path::new("d.md"), &blocks, 10, 15, &WordCounter);
        assert_eq!(sizes(&chunks), vec![11, 2]);
    }

    #[test]
    fn closes_before_block_that_would_exceed_max() {
        let blocks = vec![block(4, 1, &["A"]), block(9, 3, &["B"]), block(3, 5, &["C"])];
        let chunks = pack_blocks(Path::new("d.md"), &blocks, 10, 12, &WordCounter);
        assert_eq!(sizes(&chunks), vec![4, 12]);
        assert!(chunks.iter().all(|c| c.token_count <= 12));
    }

    #[test]
    fn last_chunk_may_reach_target_without_closing_early() {
        let blocks = vec![block(3, 1, &["A"]), block(8, 3, &["A"])];
        let chunks = pack_blocks(Path::new("d.md"), &blocks, 10, 12, &WordCounter);
        assert_eq!(sizes(&chunks), vec![11]);
    }

    #[test]
    fn chunk_metadata_covers_constituent_blocks() {
        let blocks = vec![
            block(2, 4, &["Intro", "Scope"]),
            block(2, 8, &["Intro", "Scope"]),
            block(2, 12, &["Intro", "Terms"]),
        ];
        let chunks = pack_blocks(Path::new("d.md"), &blocks, 100, 100, &WordCounter);
        assert_eq!(chunks.len(), 1);
        let c = &chunks[0];
        assert_eq!(c.headings, vec!["Intro", "Scope", "Terms"]);
        assert_eq!((c.start_line, c.end_line), (4, 13));
        assert_eq!(c.block_count, 3);
        assert_eq!(c.chunk_id, "chunk_01");
        assert_eq!(unwrap_chunk_text(&c.text), "w w\n\nw w\n\nw w");
    }

    #[test]
    fn finalize_rewraps_with_final_total() {
        let blocks = vec![block(5, 1, &["A"]), block(5, 3, &["A"]), block(5, 5, &["A"])];
        let chunks = pack_blocks(Path::new("d.md"), &blocks, 5, 5, &WordCounter);
        assert!(chunks[0].text.starts_with("<!-- chunk_01 start (1/1) -->"));

        let chunks = finalize_totals(chunks);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(chunks[0].text.starts_with("<!-- chunk_01 start (1/3) -->"));
        assert!(chunks[2].text.trim_end().ends_with("<!-- chunk_03 end (3/3) -->"));
    }

    #[test]
    fn bpe_separator_cost_stays_under_max() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let blocks: Vec<ContentBlock> = (0..40)
            .map(|i| {
                let text = format!("Item {i} ends here");
                ContentBlock {
                    tokens: counter.count_tokens(&text),
                    words: count_words(&text),
                    text,
                    start_line: 2 * i + 1,
                    end_line: 2 * i + 1,
                    heading_path: vec!["List".into()],
                }
            })
            .collect();
        assert!(counter.count_tokens(BLOCK_SEPARATOR) > 0);

        let chunks = pack_blocks(Path::new("d.md"), &blocks, 20, 20, &counter);
        let over: Vec<usize> = sizes(&chunks).into_iter().filter(|&n| n > 20).collect();
        assert!(over.is_empty(), "chunks over max=20: {over:?}");
        for c in &chunks {
            assert_eq!(c.token_count, counter.count_tokens(&unwrap_chunk_text(&c.text)));
        }
        assert_eq!(chunks.iter().map(|c| c.block_count).sum::<usize>(), 40);
    }
}
