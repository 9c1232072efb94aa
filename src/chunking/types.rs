use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// How the planner decides whether a document gets split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMode {
    /// Split only when the document does not fit the model context
    #[default]
    Auto,
    /// Always split
    Force,
    /// Never split
    Off,
}

impl ChunkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingMode::Auto => "auto",
            ChunkingMode::Force => "force",
            ChunkingMode::Off => "off",
        }
    }
}

impl fmt::Display for ChunkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ChunkingMode::Auto),
            "force" => Ok(ChunkingMode::Force),
            "off" => Ok(ChunkingMode::Off),
            other => Err(format!("unknown chunking mode '{other}'")),
        }
    }
}

/// One user-prompt variant. Every chunk is sent once per variant.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptVariant {
    pub label: String,
    pub display: String,
    pub text: String,
    pub path: Option<PathBuf>,
}

/// Inputs to the planner that do not depend on the document.
#[derive(Clone, Debug)]
pub struct ChunkPolicy {
    pub mode: ChunkingMode,
    pub target_tokens: usize,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub context_fraction: f64,
    pub context_limit: Option<usize>,
    pub pricing_input_per_1k: f64,
    pub system_prompt: String,
    pub prompts: Vec<PromptVariant>,
}

/// Heading-scoped paragraph. After limiting, `tokens` fits the ceiling
/// unless the block is a single unsplittable word.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentBlock {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub heading_path: Vec<String>,
    pub tokens: usize,
    pub words: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkdownChunk {
    #[serde(skip)]
    pub document: PathBuf,
    pub chunk_id: String,
    pub index: usize,
    #[serde(skip)]
    pub text: String,
    pub token_count: usize,
    pub word_count: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub headings: Vec<String>,
    pub block_count: usize,
    pub overlap_from_previous_tokens: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkPlan {
    pub document: PathBuf,
    pub applied_mode: ChunkingMode,
    pub reason: String,
    pub original_tokens: usize,
    pub original_words: usize,
    pub system_prompt_tokens: usize,
    pub max_user_prompt_tokens: usize,
    pub context_limit: Option<usize>,
    pub chunk_target_tokens: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub pricing_input_per_1k: f64,
    pub chunks: Vec<MarkdownChunk>,
}

impl ChunkPlan {
    /// Input tokens for the whole document when every chunk is sent once per prompt variant.
    pub fn estimated_input_tokens(&self, parts: usize) -> usize {
        let base = self.system_prompt_tokens + self.max_user_prompt_tokens;
        self.chunks.iter().map(|c| base + c.token_count).sum::<usize>() * parts
    }

    pub fn estimated_cost(&self, parts: usize) -> Option<f64> {
        if self.pricing_input_per_1k <= 0.0 {
            return None;
        }
        let total = self.estimated_input_tokens(parts) as f64;
        let cost = (total / 1000.0) * self.pricing_input_per_1k;
        Some((cost * 10_000.0).round() / 10_000.0)
    }

    pub fn is_chunked(&self) -> bool { self.chunks.len() > 1 }
}

pub fn chunk_id_for(index: usize) -> String {
    format!("chunk_{index:02}")
}
