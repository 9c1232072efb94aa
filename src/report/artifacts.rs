use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::chunking::{ChunkPlan, ChunkingMode, MarkdownChunk};
use crate::config::Settings;

const MAP_HEADING_PREVIEW: usize = 3;

/// Persisted form of a [`ChunkPlan`]; estimates are computed for `parts` prompt variants.
#[derive(Debug, Serialize)]
pub struct PlanRecord<'a> {
    pub document: String,
    pub applied_mode: ChunkingMode,
    pub reason: &'a str,
    pub original_tokens: usize,
    pub original_words: usize,
    pub system_prompt_tokens: usize,
    pub max_user_prompt_tokens: usize,
    pub context_limit: Option<usize>,
    pub chunk_target_tokens: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub pricing_input_per_1k: f64,
    pub chunk_count: usize,
    pub estimated_input_tokens: usize,
    pub estimated_cost: Option<f64>,
    pub chunks: &'a [MarkdownChunk],
}

impl<'a> PlanRecord<'a> {
    pub fn new(plan: &'a ChunkPlan, parts: usize) -> Self {
        let parts = parts.max(1);
        Self {
            document: plan.document.display().to_string(),
            applied_mode: plan.applied_mode,
            reason: &plan.reason,
            original_tokens: plan.original_tokens,
            original_words: plan.original_words,
            system_prompt_tokens: plan.system_prompt_tokens,
            max_user_prompt_tokens: plan.max_user_prompt_tokens,
            context_limit: plan.context_limit,
            chunk_target_tokens: plan.chunk_target_tokens,
            chunk_max_tokens: plan.chunk_max_tokens,
            chunk_overlap_tokens: plan.chunk_overlap_tokens,
            pricing_input_per_1k: plan.pricing_input_per_1k,
            chunk_count: plan.chunks.len(),
            estimated_input_tokens: plan.estimated_input_tokens(parts),
            estimated_cost: plan.estimated_cost(parts),
            chunks: &plan.chunks,
        }
    }
}

pub fn render_chunk_map(plan: &ChunkPlan) -> String {
    let name = plan
        .document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| plan.document.display().to_string());

    let mut lines = vec![
        format!("# Chunk map for {name}"),
        String::new(),
        format!("- Applied mode: **{}**", plan.applied_mode),
        format!("- Reason: {}", plan.reason),
        format!("- Chunks produced: **{}**", plan.chunks.len()),
        String::new(),
        "| Chunk | Tokens | Words | Lines | Sections |".to_string(),
        "| ----- | ------ | ----- | ----- | -------- |".to_string(),
    ];
    for chunk in &plan.chunks {
        let preview = chunk
            .headings
            .iter()
            .take(MAP_HEADING_PREVIEW)
            .map(|h| h.replace('|', "\\|"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "| {} | {} | {} | {}-{} | {} |",
            chunk.chunk_id, chunk.token_count, chunk.word_count, chunk.start_line, chunk.end_line, preview
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Write `<stem>_chunks.json` and `<stem>_chunk_map.md`; returns both paths.
pub fn save_chunk_plan(plan: &ChunkPlan, settings: &Settings, parts: usize) -> Result<(PathBuf, PathBuf)> {
    let json_path = settings.chunk_plan_json_path(&plan.document);
    let map_path = settings.chunk_map_markdown_path(&plan.document);
    for path in [&json_path, &map_path] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
    }

    let record = PlanRecord::new(plan, parts);
    let json = serde_json::to_string_pretty(&record).context("serialize chunk plan")?;
    fs::write(&json_path, json).with_context(|| format!("write {}", json_path.display()))?;
    fs::write(&map_path, render_chunk_map(plan)).with_context(|| format!("write {}", map_path.display()))?;
    Ok((json_path, map_path))
}
