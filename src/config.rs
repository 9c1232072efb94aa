use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use tracing::{error, warn};

use crate::chunking::{ChunkPolicy, ChunkingMode, PromptVariant};

pub const DEFAULT_OPENAI_MODEL: &str = "o4-mini-2025-04-16";
pub const DEFAULT_TOKEN_COUNTER_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PART_PATTERN: &str = "user_prompt_part*.md";

const DEFAULT_TARGET_TOKENS: i64 = 10_000;
const DEFAULT_MAX_TOKENS: i64 = 12_000;
const DEFAULT_OVERLAP_TOKENS: i64 = 200;
const DEFAULT_CONTEXT_FRACTION: f64 = 0.8;

pub const MODEL_CONTEXT_LIMITS: &[(&str, usize)] = &[
    ("o4-mini-2025-04-16", 200_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 128_000),
    ("gpt-3.5-turbo", 16_385),
];

pub const FALLBACK_SYSTEM_PROMPT: &str = "You are an analyst who produces faithful, well-structured summaries.\n\
You will receive the full content of a document in Markdown.";

pub const FALLBACK_USER_PROMPT: &str = "Summarize the document below into a new Markdown file.\n\n\
### SECTIONS\n\n\
1. **Metadata** (title, authors, dates, identifiers)\n\
2. **Key dates** as a chronological list (date, event, source)\n\
3. **Main points**\n\
4. **Summary** in running prose, objective and extractive\n\
5. **Source excerpts** (field -> literal quote -> location in the document)\n\
6. **Gaps or inconsistencies**\n\n\
### RULES\n\n\
- Output must be valid Markdown with level-2 headings (`##`) for each section.\n\
- Do not invent data: write `Not identified` when something is missing.\n\
- Keep quoted excerpts verbatim.\n\
- Use only this document as a source.\n\n\
### ORIGINAL CONTENT ({document_name})\n\n\
```markdown\n{markdown_content}\n```";

/// Runtime configuration for planning and dispatch.
#[derive(Clone, Debug)]
pub struct Settings {
    pub md_input_dir: PathBuf,
    pub ai_output_dir: PathBuf,
    pub chunk_metadata_dir: PathBuf,

    pub chunking_mode: ChunkingMode,
    pub chunk_target_tokens: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub chunk_context_fraction: f64,
    pub chunk_pricing_input_per_1k: f64,
    pub model_context_limit_override: Option<usize>,

    pub openai_model: String,
    pub token_counter_model: String,

    pub system_prompt: String,
    pub user_prompt_template: String,
    pub user_prompt_parts: Vec<PathBuf>,

    pub skip_existing_ai_outputs: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (the process environment in production).
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prompts_dir = PathBuf::from(get("PROMPTS_DIR").unwrap_or_else(|| "prompts".into()));
        let parts_dir = get("AI_USER_PROMPT_PART_DIR").map(PathBuf::from).unwrap_or_else(|| prompts_dir.clone());
        let parts_pattern = get("AI_USER_PROMPT_PART_PATTERN").unwrap_or_else(|| DEFAULT_PART_PATTERN.into());

        let system_prompt = get("AI_SYSTEM_PROMPT")
            .unwrap_or_else(|| read_prompt(&prompts_dir.join("system_prompt.txt"), FALLBACK_SYSTEM_PROMPT));
        let template_override = get("AI_USER_PROMPT_TEMPLATE");
        let user_prompt_parts = if template_override.is_some() {
            Vec::new()
        } else {
            discover_prompt_parts(&parts_dir, &parts_pattern)
        };
        let user_prompt_template = template_override
            .unwrap_or_else(|| read_prompt(&prompts_dir.join("user_prompt.md"), FALLBACK_USER_PROMPT));

        let chunking_mode = match get("AI_CHUNKING_MODE") {
            None => ChunkingMode::Auto,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid AI_CHUNKING_MODE={raw}; falling back to 'auto'");
                ChunkingMode::Auto
            }),
        };

        let mut settings = Settings {
            md_input_dir: PathBuf::from(get("MD_INPUT_DIR").unwrap_or_else(|| "md_output".into())),
            ai_output_dir: PathBuf::from(get("AI_OUTPUT_DIR").unwrap_or_else(|| "md_output_ia".into())),
            chunk_metadata_dir: PathBuf::from(get("AI_CHUNK_METADATA_DIR").unwrap_or_else(|| "chunk_metadata".into())),
            chunking_mode,
            chunk_target_tokens: 0,
            chunk_max_tokens: 0,
            chunk_overlap_tokens: 0,
            chunk_context_fraction: float_from(&get, "AI_CHUNK_CONTEXT_FRACTION", DEFAULT_CONTEXT_FRACTION),
            chunk_pricing_input_per_1k: float_from(&get, "AI_CHUNK_PRICING_INPUT_PER_1K", 0.0).max(0.0),
            model_context_limit_override: optional_usize_from(&get, "AI_MODEL_CONTEXT_LIMIT"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            token_counter_model: get("TOKEN_COUNTER_MODEL").unwrap_or_else(|| DEFAULT_TOKEN_COUNTER_MODEL.into()),
            system_prompt,
            user_prompt_template,
            user_prompt_parts,
            skip_existing_ai_outputs: get("AI_SKIP_EXISTING")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no"))
                .unwrap_or(false),
        };
        settings.set_target_tokens(int_from(&get, "AI_CHUNK_TARGET_TOKENS", DEFAULT_TARGET_TOKENS));
        settings.set_max_tokens(int_from(&get, "AI_CHUNK_MAX_TOKENS", DEFAULT_MAX_TOKENS));
        settings.set_overlap_tokens(int_from(&get, "AI_CHUNK_OVERLAP_TOKENS", DEFAULT_OVERLAP_TOKENS));
        settings.normalize();
        settings
    }

    pub fn set_target_tokens(&mut self, raw: i64) {
        if raw < 1 {
            warn!("chunk target tokens must be positive (got {raw}); using 1");
        }
        self.chunk_target_tokens = raw.max(1) as usize;
    }

    pub fn set_max_tokens(&mut self, raw: i64) {
        if raw < 1 {
            warn!("chunk max tokens must be positive (got {raw}); using 1");
        }
        self.chunk_max_tokens = raw.max(1) as usize;
    }

    pub fn set_overlap_tokens(&mut self, raw: i64) {
        if raw < 0 {
            warn!("chunk overlap tokens cannot be negative (got {raw}); using 0");
        }
        self.chunk_overlap_tokens = raw.max(0) as usize;
    }

    /// Re-establish cross-field invariants after overrides: max >= target, fraction in (0, 1].
    pub fn normalize(&mut self) {
        if self.chunk_max_tokens < self.chunk_target_tokens {
            warn!(
                "chunk max tokens ({}) below target ({}); raising max to target",
                self.chunk_max_tokens, self.chunk_target_tokens
            );
            self.chunk_max_tokens = self.chunk_target_tokens;
        }
        if !(self.chunk_context_fraction > 0.0 && self.chunk_context_fraction <= 1.0) {
            warn!(
                "chunk context fraction {} outside (0, 1]; using {DEFAULT_CONTEXT_FRACTION}",
                self.chunk_context_fraction
            );
            self.chunk_context_fraction = DEFAULT_CONTEXT_FRACTION;
        }
    }

    /// Maximum context (tokens) of the configured model; `None` when unknown.
    pub fn model_context_limit(&self) -> Option<usize> {
        self.model_context_limit_override.or_else(|| {
            MODEL_CONTEXT_LIMITS
                .iter()
                .find(|(model, _)| *model == self.openai_model)
                .map(|(_, limit)| *limit)
        })
    }

    /// Prompt variants to run per chunk, in execution order.
    pub fn prompt_variants(&self, inline_override: Option<&str>) -> Vec<PromptVariant> {
        if let Some(text) = inline_override {
            return vec![PromptVariant {
                label: "part1".into(),
                display: "inline-override".into(),
                text: text.to_string(),
                path: None,
            }];
        }

        let mut variants = Vec::new();
        for path in &self.user_prompt_parts {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to read user prompt part {}: {e}", path.display());
                    continue;
                }
            };
            variants.push(PromptVariant {
                label: format!("part{}", variants.len() + 1),
                display: path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
                text,
                path: Some(path.clone()),
            });
        }
        if !variants.is_empty() {
            return variants;
        }

        vec![PromptVariant {
            label: "part1".into(),
            display: "default".into(),
            text: self.user_prompt_template.clone(),
            path: None,
        }]
    }

    pub fn chunk_policy(&self, prompts: Vec<PromptVariant>) -> ChunkPolicy {
        ChunkPolicy {
            mode: self.chunking_mode,
            target_tokens: self.chunk_target_tokens,
            max_tokens: self.chunk_max_tokens,
            overlap_tokens: self.chunk_overlap_tokens,
            context_fraction: self.chunk_context_fraction,
            context_limit: self.model_context_limit(),
            pricing_input_per_1k: self.chunk_pricing_input_per_1k,
            system_prompt: self.system_prompt.clone(),
            prompts,
        }
    }

    pub fn chunk_plan_json_path(&self, document: &Path) -> PathBuf {
        self.chunk_metadata_dir.join(format!("{}_chunks.json", file_stem(document)))
    }

    pub fn chunk_map_markdown_path(&self, document: &Path) -> PathBuf {
        self.chunk_metadata_dir.join(format!("{}_chunk_map.md", file_stem(document)))
    }

    pub fn ensure_directories(&self, include_ai: bool) -> Result<()> {
        let mut dirs = vec![&self.chunk_metadata_dir];
        if include_ai {
            dirs.push(&self.ai_output_dir);
        }
        for dir in dirs {
            fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "document".into())
}

fn read_prompt(path: &Path, fallback: &str) -> String {
    fs::read_to_string(path).map(|s| s.trim().to_string()).unwrap_or_else(|_| fallback.to_string())
}

// sorted files in `dir` matching a glob pattern
fn discover_prompt_parts(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!("{}/{pattern}", Pattern::escape(&dir.to_string_lossy()));
    let paths = match glob(&full) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Invalid prompt part pattern {pattern}: {e}; ignoring prompt parts");
            return Vec::new();
        }
    };
    let mut parts: Vec<PathBuf> = paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect();
    parts.sort();
    parts
}

fn int_from<F: Fn(&str) -> Option<String>>(get: &F, name: &str, default: i64) -> i64 {
    let Some(raw) = get(name) else { return default };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("Invalid integer for {name}={raw}; using default {default}");
        default
    })
}

fn float_from<F: Fn(&str) -> Option<String>>(get: &F, name: &str, default: f64) -> f64 {
    let Some(raw) = get(name) else { return default };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("Invalid float for {name}={raw}; using default {default:.3}");
        default
    })
}

fn optional_usize_from<F: Fn(&str) -> Option<String>>(get: &F, name: &str) -> Option<usize> {
    let raw = get(name)?;
    if raw.trim().is_empty() {
        return None;
    }
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Invalid integer for {name}={raw}; ignoring override");
            None
        }
    }
}
