pub mod plan;
pub mod summarize;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use glob::{glob, Pattern};
use serde::Serialize;

use crate::chunking::{ChunkPlan, ChunkingMode};
use crate::config::Settings;

/// Planning flags shared by every command. Unset flags keep the environment value.
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkArgs {
    /// Markdown files to process (default: every *.md in the input directory)
    pub files: Vec<PathBuf>,
    #[arg(long)] pub md_dir: Option<PathBuf>,
    #[arg(long)] pub metadata_dir: Option<PathBuf>,
    #[arg(long, value_enum)] pub chunking: Option<ChunkingMode>,
    #[arg(long, allow_negative_numbers = true)] pub chunk_target: Option<i64>,
    #[arg(long, allow_negative_numbers = true)] pub chunk_max: Option<i64>,
    #[arg(long, allow_negative_numbers = true)] pub chunk_overlap: Option<i64>,
    /// Price per 1k input tokens, used for cost estimates only
    #[arg(long)] pub chunk_price_input: Option<f64>,
    /// Override the model context limit (tokens)
    #[arg(long)] pub context_limit: Option<usize>,
    /// tiktoken model name, or hf:<repo> for a Hugging Face tokenizer
    #[arg(long)] pub token_counter_model: Option<String>,
    #[arg(long)] pub ai_model: Option<String>,
}

impl ChunkArgs {
    /// Environment settings with these flags applied on top, normalized.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        self.apply(&mut settings);
        settings
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.md_dir { settings.md_input_dir = dir.clone(); }
        if let Some(dir) = &self.metadata_dir { settings.chunk_metadata_dir = dir.clone(); }
        if let Some(mode) = self.chunking { settings.chunking_mode = mode; }
        if let Some(v) = self.chunk_target { settings.set_target_tokens(v); }
        if let Some(v) = self.chunk_max { settings.set_max_tokens(v); }
        if let Some(v) = self.chunk_overlap { settings.set_overlap_tokens(v); }
        if let Some(v) = self.chunk_price_input { settings.chunk_pricing_input_per_1k = v.max(0.0); }
        if let Some(v) = self.context_limit { settings.model_context_limit_override = Some(v); }
        if let Some(m) = &self.token_counter_model { settings.token_counter_model = m.clone(); }
        if let Some(m) = &self.ai_model { settings.openai_model = m.clone(); }
        settings.normalize();
    }

    /// Explicit paths win; otherwise scan the input directory.
    pub fn resolve_inputs(&self, settings: &Settings) -> Result<Vec<PathBuf>> {
        if !self.files.is_empty() {
            return Ok(self.files.clone());
        }
        collect_markdown_files(&settings.md_input_dir)
    }

    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("files", self.files.len().to_string()),
            ("md_dir", format!("{:?}", self.md_dir)),
            ("chunking", format!("{:?}", self.chunking)),
            ("chunk_target", format!("{:?}", self.chunk_target)),
            ("chunk_max", format!("{:?}", self.chunk_max)),
            ("chunk_overlap", format!("{:?}", self.chunk_overlap)),
            ("ai_model", format!("{:?}", self.ai_model)),
        ]
    }
}

/// `*.md` files directly inside `dir`, sorted by name.
pub fn collect_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("read markdown directory {}: not a directory", dir.display());
    }
    let pattern = format!("{}/*.md", Pattern::escape(&dir.to_string_lossy()));
    let paths = glob(&pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.with_context(|| format!("Error resolving pattern: {pattern}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Per-document line of the command's JSON envelope.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document: String,
    pub applied_mode: ChunkingMode,
    pub reason: String,
    pub chunk_count: usize,
    pub chunked: bool,
    pub original_tokens: usize,
    pub estimated_input_tokens: usize,
    pub estimated_cost: Option<f64>,
    pub plan_json: PathBuf,
    pub chunk_map: PathBuf,
}

impl DocumentSummary {
    pub fn new(plan: &ChunkPlan, parts: usize, plan_json: PathBuf, chunk_map: PathBuf) -> Self {
        Self {
            document: plan.document.display().to_string(),
            applied_mode: plan.applied_mode,
            reason: plan.reason.clone(),
            chunk_count: plan.chunks.len(),
            chunked: plan.is_chunked(),
            original_tokens: plan.original_tokens,
            estimated_input_tokens: plan.estimated_input_tokens(parts),
            estimated_cost: plan.estimated_cost(parts),
            plan_json,
            chunk_map,
        }
    }
}
