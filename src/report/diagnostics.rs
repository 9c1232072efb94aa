use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::chunking::{ChunkPlan, PromptVariant};
use crate::config::file_stem;
use crate::tokenizer::{count_words, TokenCounter};

use super::naming;

pub const MERGED_LABEL: &str = "merged";

/// One file produced (or reused) by the summarize stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub document: PathBuf,
    /// `None` for the document-level concatenation.
    pub chunk_id: Option<String>,
    /// Prompt label, or [`MERGED_LABEL`] for merged files.
    pub label: String,
    pub output_file: PathBuf,
    pub elapsed_secs: Option<f64>,
    pub token_count: usize,
    pub word_count: usize,
    pub reused: bool,
}

type RecordKey<'a> = (&'a Path, Option<&'a str>, &'a str);

/// Per-document processing report, one log line per entry.
pub fn diagnostic_lines(
    plans: &[ChunkPlan],
    outputs: &[OutputRecord],
    prompts: &[PromptVariant],
    ai_dir: &Path,
    counter: &dyn TokenCounter,
) -> Vec<String> {
    let index: HashMap<RecordKey<'_>, &OutputRecord> = outputs
        .iter()
        .map(|r| ((r.document.as_path(), r.chunk_id.as_deref(), r.label.as_str()), r))
        .collect();
    let multi = naming::is_multi_prompt(prompts);

    let mut sorted: Vec<&ChunkPlan> = plans.iter().collect();
    sorted.sort_by_key(|p| display_name(&p.document).to_lowercase());

    let mut lines = vec!["===== Processing diagnostics =====".to_string()];
    for plan in sorted {
        let stem = file_stem(&plan.document);
        let total = plan.chunks.len();
        lines.push(format!("Document: {}", display_name(&plan.document)));
        lines.push(format!("1. Markdown: {} tokens | {} words", plan.original_tokens, plan.original_words));
        lines.push(format!(
            "2. Chunking: {} chunk(s) | mode={} | reason={}",
            total, plan.applied_mode, plan.reason
        ));

        for chunk in &plan.chunks {
            let base = naming::base_filename(&stem, chunk, total);
            lines.push(format!(
                "   - {} ({}/{}): {} tokens | {} words | lines {}-{}",
                chunk.chunk_id, chunk.index, total, chunk.token_count, chunk.word_count, chunk.start_line, chunk.end_line
            ));

            for prompt in prompts {
                let prefix = format!("     · Prompt {} ({}):", prompt.display, prompt.label);
                let key = (plan.document.as_path(), Some(chunk.chunk_id.as_str()), prompt.label.as_str());
                match index.get(&key) {
                    Some(r) if !r.reused => lines.push(format!(
                        "{prefix} {:.2}s | output {}",
                        r.elapsed_secs.unwrap_or_default(),
                        display_name(&r.output_file)
                    )),
                    Some(r) => lines.push(format!("{prefix} already present ({})", display_name(&r.output_file))),
                    None => {
                        let path = naming::variant_output_path(ai_dir, &base, &prompt.label, multi);
                        if path.exists() {
                            lines.push(format!("{prefix} already present ({})", display_name(&path)));
                        } else {
                            lines.push(format!("{prefix} not executed"));
                        }
                    }
                }
            }

            if multi {
                let key = (plan.document.as_path(), Some(chunk.chunk_id.as_str()), MERGED_LABEL);
                let path = naming::merged_output_path(ai_dir, &base);
                lines.push(format!("     · Merged chunk: {}", merged_status(index.get(&key).copied(), &path, counter)));
            }
        }

        if total > 1 {
            let key = (plan.document.as_path(), None, MERGED_LABEL);
            let path = naming::document_output_path(ai_dir, &stem);
            lines.push(format!("3. Concatenated markdown: {}", merged_status(index.get(&key).copied(), &path, counter)));
        }
    }
    lines
}

fn merged_status(record: Option<&OutputRecord>, path: &Path, counter: &dyn TokenCounter) -> String {
    if let Some(r) = record {
        return format!("{} tokens | {} words ({})", r.token_count, r.word_count, display_name(&r.output_file));
    }
    match fs::read_to_string(path) {
        Ok(text) => format!("{} tokens | {} words (pre-existing)", counter.count_tokens(&text), count_words(&text)),
        Err(_) => "not generated".to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::types::chunk_id_for;
    use crate::chunking::{ChunkingMode, MarkdownChunk};
    use crate::tokenizer::WordCounter;

    fn plan(doc: &str, chunks: usize) -> ChunkPlan {
        ChunkPlan {
            document: PathBuf::from(doc),
            applied_mode: ChunkingMode::Auto,
            reason: "markdown exceeds available budget (20>10); chunking enabled".into(),
            original_tokens: 20,
            original_words: 20,
            system_prompt_tokens: 0,
            max_user_prompt_tokens: 0,
            context_limit: Some(100),
            chunk_target_tokens: 10,
            chunk_max_tokens: 10,
            chunk_overlap_tokens: 0,
            pricing_input_per_1k: 0.0,
            chunks: (1..=chunks)
                .map(|i| MarkdownChunk {
                    document: PathBuf::from(doc),
                    chunk_id: chunk_id_for(i),
                    index: i,
                    text: String::new(),
                    token_count: 10,
                    word_count: 10,
                    start_line: i,
                    end_line: i,
                    headings: vec![],
                    block_count: 1,
                    overlap_from_previous_tokens: 0,
                })
                .collect(),
        }
    }

    fn variant(label: &str, display: &str) -> PromptVariant {
        PromptVariant { label: label.into(), display: display.into(), text: String::new(), path: None }
    }

    fn record(doc: &str, chunk: Option<&str>, label: &str, file: &str, reused: bool) -> OutputRecord {
        OutputRecord {
            document: PathBuf::from(doc),
            chunk_id: chunk.map(str::to_string),
            label: label.into(),
            output_file: PathBuf::from(file),
            elapsed_secs: if reused { None } else { Some(1.5) },
            token_count: 7,
            word_count: 6,
            reused,
        }
    }

    #[test]
    fn reports_each_prompt_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let ai_dir = tmp.path();
        let prompts = vec![variant("part1", "summary"), variant("part2", "timeline")];
        let outputs = vec![
            record("b.md", Some("chunk_01"), "part1", "b_chunk_01_ai_part1.md", false),
            record("b.md", Some("chunk_01"), "part2", "b_chunk_01_ai_part2.md", true),
            record("b.md", Some("chunk_01"), MERGED_LABEL, "b_chunk_01_ai.md", false),
            record("b.md", None, MERGED_LABEL, "b_ai.md", false),
        ];
        let lines = diagnostic_lines(&[plan("b.md", 2), plan("a.md", 1)], &outputs, &prompts, ai_dir, &WordCounter);
        let text = lines.join("\n");

        let a_pos = text.find("Document: a.md").unwrap();
        let b_pos = text.find("Document: b.md").unwrap();
        assert!(a_pos < b_pos);
        assert!(text.contains("     · Prompt summary (part1): 1.50s | output b_chunk_01_ai_part1.md"));
        assert!(text.contains("     · Prompt timeline (part2): already present (b_chunk_01_ai_part2.md)"));
        assert!(text.contains("     · Merged chunk: 7 tokens | 6 words (b_chunk_01_ai.md)"));
        assert!(text.contains("     · Merged chunk: not generated"));
        assert!(text.contains("3. Concatenated markdown: 7 tokens | 6 words (b_ai.md)"));
        assert_eq!(text.matches("not executed").count(), 4);
    }

    #[test]
    fn existing_files_count_as_already_present() {
        let tmp = tempfile::tempdir().unwrap();
        let ai_dir = tmp.path();
        fs::write(ai_dir.join("a_ai.md"), "earlier run output").unwrap();

        let lines = diagnostic_lines(&[plan("a.md", 1)], &[], &[variant("part1", "default")], ai_dir, &WordCounter);
        assert!(lines.iter().any(|l| l == "     · Prompt default (part1): already present (a_ai.md)"));
        assert!(!lines.iter().any(|l| l.contains("Merged chunk")));
        assert!(!lines.iter().any(|l| l.starts_with("3.")));
    }
}
