use std::path::Path;

use tracing::warn;

use crate::tokenizer::{count_words, TokenCounter};

use super::limit::enforce_block_limits;
use super::pack::{finalize_totals, pack_blocks};
use super::segment::segment_blocks;
use super::stitch::stitch_overlap;
use super::types::{chunk_id_for, ChunkPlan, ChunkPolicy, ChunkingMode, MarkdownChunk};
use super::wrap::wrap_chunk_text;

pub const WHOLE_DOCUMENT_HEADING: &str = "<whole document>";

/// Outcome of the chunk/no-chunk decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub chunk: bool,
    pub reason: String,
}

/// Fixed per-request overhead: system prompt plus the most expensive user prompt variant.
pub fn prompt_overhead(policy: &ChunkPolicy, counter: &dyn TokenCounter) -> (usize, usize) {
    let system = counter.count_tokens(&policy.system_prompt);
    let max_user = policy
        .prompts
        .iter()
        .map(|p| counter.count_tokens(&p.text))
        .max()
        .unwrap_or(0);
    (system, max_user)
}

pub fn decide(
    mode: ChunkingMode,
    document_tokens: usize,
    context_limit: Option<usize>,
    context_fraction: f64,
    overhead_tokens: usize,
) -> Decision {
    let (chunk, reason) = match mode {
        ChunkingMode::Force => (true, "forced chunking (mode=force)".to_string()),
        ChunkingMode::Off => (false, "chunking disabled (mode=off)".to_string()),
        ChunkingMode::Auto => match context_limit {
            None => (false, "no known limit for the model; sending the document whole".to_string()),
            Some(limit) => {
                let budget = (limit as f64 * context_fraction).floor() as i64;
                let available = budget - overhead_tokens as i64;
                if available <= 0 {
                    (true, "context limit exhausted by prompts; chunking required".to_string())
                } else if document_tokens as i64 <= available {
                    (false, "document fits in the context window".to_string())
                } else {
                    (
                        true,
                        format!("markdown exceeds available budget ({document_tokens}>{available}); chunking enabled"),
                    )
                }
            }
        },
    };
    Decision { chunk, reason }
}

/// Build the chunk plan for one document. Pure apart from debug/warn logging.
pub fn build_plan(
    document: &Path,
    markdown: &str,
    policy: &ChunkPolicy,
    counter: &dyn TokenCounter,
) -> ChunkPlan {
    let original_tokens = counter.count_tokens(markdown);
    let (system_tokens, max_user_tokens) = prompt_overhead(policy, counter);
    let decision = decide(
        policy.mode,
        original_tokens,
        policy.context_limit,
        policy.context_fraction,
        system_tokens + max_user_tokens,
    );

    let mut plan = ChunkPlan {
        document: document.to_path_buf(),
        applied_mode: policy.mode,
        reason: decision.reason,
        original_tokens,
        original_words: count_words(markdown),
        system_prompt_tokens: system_tokens,
        max_user_prompt_tokens: max_user_tokens,
        context_limit: policy.context_limit,
        chunk_target_tokens: policy.target_tokens,
        chunk_max_tokens: policy.max_tokens,
        chunk_overlap_tokens: policy.overlap_tokens,
        pricing_input_per_1k: policy.pricing_input_per_1k,
        chunks: Vec::new(),
    };

    if !decision.chunk {
        plan.chunks.push(whole_document_chunk(document, markdown, counter));
        return plan;
    }

    let blocks = segment_blocks(markdown, counter);
    if blocks.is_empty() {
        warn!(document = %document.display(), "document has no content blocks; using a single chunk");
        plan.reason = format!("{}; no content blocks found, single chunk used", plan.reason);
        plan.chunks.push(whole_document_chunk(document, markdown, counter));
        return plan;
    }

    let blocks = enforce_block_limits(blocks, policy.max_tokens, counter);
    let packed = pack_blocks(document, &blocks, policy.target_tokens, policy.max_tokens, counter);
    let finalized = finalize_totals(packed);
    plan.chunks = stitch_overlap(finalized, policy.overlap_tokens, counter);
    plan
}

fn whole_document_chunk(document: &Path, markdown: &str, counter: &dyn TokenCounter) -> MarkdownChunk {
    let body = markdown.trim();
    let chunk_id = chunk_id_for(1);
    MarkdownChunk {
        document: document.to_path_buf(),
        text: wrap_chunk_text(&chunk_id, 1, 1, body),
        chunk_id,
        index: 1,
        token_count: counter.count_tokens(body),
        word_count: count_words(body),
        start_line: 1,
        end_line: markdown.lines().count().max(1),
        headings: vec![WHOLE_DOCUMENT_HEADING.to_string()],
        block_count: 1,
        overlap_from_previous_tokens: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::types::PromptVariant;
    use crate::chunking::wrap::unwrap_chunk_text;
    use crate::tokenizer::{TiktokenCounter, WordCounter};

    fn words(n: usize, prefix: &str) -> String {
        (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
    }

    fn policy(mode: ChunkingMode, target: usize, max: usize, overlap: usize) -> ChunkPolicy {
        ChunkPolicy {
            mode,
            target_tokens: target,
            max_tokens: max,
            overlap_tokens: overlap,
            context_fraction: 0.8,
            context_limit: Some(16_000),
            pricing_input_per_1k: 0.0,
            system_prompt: words(200, "s"),
            prompts: vec![
                PromptVariant {
                    label: "part1".into(),
                    display: "summary".into(),
                    text: words(120, "u"),
                    path: None,
                },
                PromptVariant {
                    label: "part2".into(),
                    display: "timeline".into(),
                    text: words(300, "t"),
                    path: None,
                },
            ],
        }
    }

    #[test]
    fn overhead_takes_worst_prompt_variant() {
        let p = policy(ChunkingMode::Auto, 10, 15, 0);
        assert_eq!(prompt_overhead(&p, &WordCounter), (200, 300));
    }

    #[test]
    fn auto_mode_decisions() {
        let unknown = decide(ChunkingMode::Auto, 1_000_000, None, 0.8, 0);
        assert!(!unknown.chunk);
        assert!(unknown.reason.contains("no known limit"));

        assert!(!decide(ChunkingMode::Auto, 12_300, Some(16_000), 0.8, 500).chunk);
        let over = decide(ChunkingMode::Auto, 12_301, Some(16_000), 0.8, 500);
        assert!(over.chunk);
        assert!(over.reason.contains("12301>12300"));

        let starved = decide(ChunkingMode::Auto, 1, Some(1_000), 0.5, 500);
        assert!(starved.chunk);
    }

    #[test]
    fn off_mode_never_chunks() {
        let d = decide(ChunkingMode::Off, 10_000_000, Some(100), 0.8, 0);
        assert!(!d.chunk);
    }

    #[test]
    fn small_document_gets_single_whole_chunk() {
        let md = "# Title\n\nshort body\n\nmore text\n";
        let plan = build_plan(Path::new("case.md"), md, &policy(ChunkingMode::Auto, 10_000, 12_000, 200), &WordCounter);
        assert_eq!(plan.chunks.len(), 1);
        let c = &plan.chunks[0];
        assert_eq!((c.start_line, c.end_line), (1, 5));
        assert_eq!(c.headings, vec![WHOLE_DOCUMENT_HEADING]);
        assert_eq!(unwrap_chunk_text(&c.text), md.trim());
        assert!(c.text.starts_with("<!-- chunk_01 start (1/1) -->"));
        assert_eq!(plan.system_prompt_tokens, 200);
        assert_eq!(plan.max_user_prompt_tokens, 300);
    }

    #[test]
    fn force_mode_chunks_small_documents() {
        let md = format!("{}\n\n{}\n\n{}\n\n{}\n\n{}", words(10, "a"), words(10, "b"), words(10, "c"), words(10, "d"), words(10, "e"));
        let plan = build_plan(Path::new("f.md"), &md, &policy(ChunkingMode::Force, 10, 15, 0), &WordCounter);
        assert!(plan.reason.contains("force"));
        assert_eq!(plan.original_tokens, 50);
        assert_eq!(plan.chunks.len(), 5);
        let indices: Vec<usize> = plan.chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(plan.chunks.iter().all(|c| c.token_count <= 15));
        assert!(plan.chunks[4].text.contains("(5/5)"));
    }

    #[test]
    fn forced_whitespace_document_falls_back_to_single_chunk() {
        let plan = build_plan(Path::new("blank.md"), "  \n\n \n", &policy(ChunkingMode::Force, 10, 15, 5), &WordCounter);
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.chunks[0].token_count, 0);
        assert!(plan.reason.contains("no content blocks"));
    }

    #[test]
    fn three_section_document_splits_into_two_chunks() {
        let md = format!(
            "## One\n\n{}\n\n## Two\n\n{}\n\n## Three\n\n{}\n",
            words(3_998, "a"),
            words(8_998, "b"),
            words(2_998, "c"),
        );
        let p = policy(ChunkingMode::Auto, 10_000, 12_000, 200);
        let plan = build_plan(Path::new("big.md"), &md, &p, &WordCounter);

        assert_eq!(plan.original_tokens, 16_000);
        assert!(plan.reason.contains("16000>12300"));
        assert_eq!(plan.chunks.len(), 2);

        let (first, second) = (&plan.chunks[0], &plan.chunks[1]);
        assert_eq!(first.overlap_from_previous_tokens, 0);
        assert!(first.token_count <= 12_000);
        assert_eq!(first.headings, vec!["One", "Two"]);
        assert!(second.overlap_from_previous_tokens > 0);
        assert!(second.overlap_from_previous_tokens <= 200);
        assert_eq!(second.headings, vec!["Two", "Three"]);
        assert!(unwrap_chunk_text(&second.text).starts_with("<!-- overlap-from-previous chunk=chunk_01 -->"));
        assert_eq!(second.end_line, md.lines().count());
    }

    #[test]
    fn headings_are_unique_in_first_seen_order() {
        let md = format!("# Guide\n\n## Setup\n{}\n\n{}\n\n## Setup\n{}", words(4, "a"), words(4, "b"), words(4, "c"));
        let plan = build_plan(Path::new("g.md"), &md, &policy(ChunkingMode::Force, 100, 100, 0), &WordCounter);
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.chunks[0].headings, vec!["Guide", "Setup"]);
    }

    #[test]
    fn off_mode_keeps_oversized_document_whole() {
        let md = format!("## One\n\n{}\n\n## Two\n\n{}\n", words(9_000, "a"), words(9_000, "b"));
        let plan = build_plan(Path::new("huge.md"), &md, &policy(ChunkingMode::Off, 10_000, 12_000, 200), &WordCounter);
        assert_eq!(plan.original_tokens, 18_004);
        assert_eq!(plan.chunks.len(), 1);
        assert!(plan.reason.contains("mode=off"));
        assert!(!plan.is_chunked());
        let c = &plan.chunks[0];
        assert_eq!(c.token_count, 18_004);
        assert_eq!(c.overlap_from_previous_tokens, 0);
        assert_eq!((c.start_line, c.end_line), (1, md.lines().count()));
    }

    #[test]
    fn whole_chunk_lines_match_segmented_numbering() {
        let p = policy(ChunkingMode::Auto, 10_000, 12_000, 0);
        assert_eq!(build_plan(Path::new("a.md"), "one\ntwo", &p, &WordCounter).chunks[0].end_line, 2);
        assert_eq!(build_plan(Path::new("a.md"), "one\ntwo\n", &p, &WordCounter).chunks[0].end_line, 2);
        assert_eq!(build_plan(Path::new("a.md"), "", &p, &WordCounter).chunks[0].end_line, 1);
    }

    #[test]
    fn bpe_counted_plan_respects_ceiling() {
        let counter = TiktokenCounter::for_model("gpt-4o-mini").unwrap();
        let mut md = String::new();
        for section in 1..=4 {
            md.push_str(&format!("## Part {section}\n\n"));
            for para in 1..=6 {
                md.push_str(&format!("Paragraph {para} of part {section} covers the findings.\n\n"));
            }
            let long: Vec<String> = (1..=12)
                .map(|n| format!("Sentence {n} in part {section} restates an earlier point."))
                .collect();
            md.push_str(&long.join(" "));
            md.push_str("\n\n");
        }

        let mut p = policy(ChunkingMode::Force, 40, 50, 0);
        p.system_prompt = "sys".into();
        let plan = build_plan(Path::new("bpe.md"), &md, &p, &counter);

        assert!(plan.chunks.len() > 4);
        for c in &plan.chunks {
            let body = unwrap_chunk_text(&c.text);
            assert_eq!(c.token_count, counter.count_tokens(&body));
            assert!(c.token_count <= 50, "{} has {} tokens", c.chunk_id, c.token_count);
        }

        p.overlap_tokens = 8;
        let stitched = build_plan(Path::new("bpe.md"), &md, &p, &counter);
        assert_eq!(stitched.chunks.len(), plan.chunks.len());
        assert!(stitched.chunks.iter().skip(1).all(|c| (1..=8).contains(&c.overlap_from_previous_tokens)));
    }
}
