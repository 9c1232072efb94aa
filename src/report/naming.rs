use std::path::{Path, PathBuf};

use crate::chunking::{MarkdownChunk, PromptVariant};

const SINGLE_PROMPT_DISPLAYS: [&str; 2] = ["default", "inline-override"];

/// More than one variant, or any variant sourced from a prompt part file.
pub fn is_multi_prompt(prompts: &[PromptVariant]) -> bool {
    prompts.len() > 1 || prompts.iter().any(|p| !SINGLE_PROMPT_DISPLAYS.contains(&p.display.as_str()))
}

/// `<stem>_ai` for a single-chunk document, `<stem>_<chunk_id>_ai` otherwise.
pub fn base_filename(stem: &str, chunk: &MarkdownChunk, total_chunks: usize) -> String {
    if total_chunks <= 1 {
        format!("{stem}_ai")
    } else {
        format!("{stem}_{}_ai", chunk.chunk_id)
    }
}

pub fn variant_output_path(ai_dir: &Path, base: &str, label: &str, multi_prompt: bool) -> PathBuf {
    if multi_prompt {
        ai_dir.join(format!("{base}_{label}.md"))
    } else {
        ai_dir.join(format!("{base}.md"))
    }
}

pub fn merged_output_path(ai_dir: &Path, base: &str) -> PathBuf {
    ai_dir.join(format!("{base}.md"))
}

pub fn document_output_path(ai_dir: &Path, stem: &str) -> PathBuf {
    ai_dir.join(format!("{stem}_ai.md"))
}
