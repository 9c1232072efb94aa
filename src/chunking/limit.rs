use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::tokenizer::{count_words, TokenCounter};

use super::types::ContentBlock;

fn sentence_gap_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"))
}

fn starts_sentence(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, 'À'..='Ö' | 'Ø'..='Þ')
}

/// Split every block above `max_tokens` into sentence groups, or word groups for
/// sentences that alone exceed the ceiling. Blocks that fit pass through untouched.
pub fn enforce_block_limits(
    blocks: Vec<ContentBlock>,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<ContentBlock> {
    let max_tokens = max_tokens.max(1);
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.tokens <= max_tokens {
            out.push(block);
            continue;
        }
        let segments = split_text_to_token_limit(&block.text, max_tokens, counter);
        debug!(tokens = block.tokens, segments = segments.len(), start_line = block.start_line, "splitting oversized block");
        for segment in segments {
            let text = segment.trim();
            if text.is_empty() {
                continue;
            }
            out.push(ContentBlock {
                text: text.to_string(),
                start_line: block.start_line,
                end_line: block.end_line,
                heading_path: block.heading_path.clone(),
                tokens: counter.count_tokens(text),
                words: count_words(text),
            });
        }
    }
    out
}

/// Sentence boundary: terminal punctuation, whitespace, then an uppercase letter or digit.
/// Abbreviations and scripts without this convention split imperfectly.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for m in sentence_gap_re().find_iter(text) {
        let next = text[m.end()..].chars().next();
        if !next.is_some_and(starts_sentence) {
            continue;
        }
        // keep the punctuation with its sentence
        out.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    out.push(&text[start..]);
    out
}

fn split_text_to_token_limit(text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> Vec<String> {
    if counter.count_tokens(text) <= max_tokens {
        return vec![text.to_string()];
    }

    let mut segments: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for sentence in split_sentences(text) {
        let sentence_tokens = counter.count_tokens(sentence);
        if sentence_tokens > max_tokens {
            if !buffer.is_empty() {
                segments.push(std::mem::take(&mut buffer));
            }
            segments.extend(split_words_evenly(sentence, sentence_tokens, max_tokens));
            continue;
        }
        if !buffer.is_empty() {
            // the joined text is what gets counted downstream
            let candidate = format!("{buffer} {sentence}");
            if counter.count_tokens(&candidate) <= max_tokens {
                buffer = candidate;
                continue;
            }
            segments.push(std::mem::take(&mut buffer));
        }
        buffer.push_str(sentence);
    }
    if !buffer.is_empty() {
        segments.push(buffer);
    }
    if segments.is_empty() {
        return vec![text.to_string()];
    }
    segments
}

// ceil(tokens / max) groups of equal word count; groups are sized by words, not tokens
fn split_words_evenly(sentence: &str, sentence_tokens: usize, max_tokens: usize) -> Vec<String> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let groups = sentence_tokens.div_ceil(max_tokens).max(1);
    let step = words.len().div_ceil(groups).max(1);
    words.chunks(step).map(|w| w.join(" ")).collect()
}
