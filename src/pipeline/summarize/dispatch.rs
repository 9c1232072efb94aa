use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::chunking::{ChunkPlan, MarkdownChunk, PromptVariant};
use crate::config::file_stem;
use crate::llm::{CompletionRequest, LlmClient};
use crate::report::diagnostics::MERGED_LABEL;
use crate::report::{naming, OutputRecord};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::summarize::{Phase as SummarizePhase, Summarize};
use crate::tokenizer::{count_words, TokenCounter};

use super::prompt::{chunk_content, concatenate_chunk_outputs, merge_prompt_outputs, render_user_prompt};

/// Everything a dispatch run needs besides the plan and the client.
pub struct DispatchJob<'a> {
    pub ai_dir: &'a Path,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub prompts: &'a [PromptVariant],
    pub skip_existing: bool,
    pub counter: &'a dyn TokenCounter,
}

/// Send every chunk once per prompt variant and write the responses.
///
/// A failed request or write is logged and skipped; the rest of the document still runs.
pub async fn dispatch_plan(
    client: &dyn LlmClient,
    plan: &ChunkPlan,
    job: &DispatchJob<'_>,
    log: &LogCtx<Summarize>,
) -> Vec<OutputRecord> {
    let stem = file_stem(&plan.document);
    let total = plan.chunks.len();
    let multi = naming::is_multi_prompt(job.prompts);

    let mut records = Vec::new();
    let mut chunk_outputs: Vec<(&MarkdownChunk, String)> = Vec::new();

    for chunk in &plan.chunks {
        let base = naming::base_filename(&stem, chunk, total);
        let content = chunk_content(chunk, total);
        let mut part_outputs: Vec<(&PromptVariant, String)> = Vec::new();

        for variant in job.prompts {
            let path = naming::variant_output_path(job.ai_dir, &base, &variant.label, multi);
            let record = |elapsed_secs: Option<f64>, text: &str, reused: bool| OutputRecord {
                document: plan.document.clone(),
                chunk_id: Some(chunk.chunk_id.clone()),
                label: variant.label.clone(),
                output_file: path.clone(),
                elapsed_secs,
                token_count: job.counter.count_tokens(text),
                word_count: count_words(text),
                reused,
            };

            if job.skip_existing {
                if let Some(text) = read_existing(&path, log) {
                    log.info(format!("⏭️  {} already present, reusing", path.display()));
                    records.push(record(None, &text, true));
                    part_outputs.push((variant, text));
                    continue;
                }
            }

            let request = CompletionRequest {
                model: job.model.to_string(),
                system: job.system_prompt.to_string(),
                user: render_user_prompt(&variant.text, &stem, &content),
            };

            log.info(format!("🤖 {} {}/{} prompt {} ({})", stem, chunk.index, total, variant.display, variant.label));
            let started = Instant::now();
            let response = match client.complete(request).await {
                Ok(resp) => resp,
                Err(e) => {
                    log.error(format!("❌ completion failed for {} {} {}: {e}", stem, chunk.chunk_id, variant.label));
                    continue;
                }
            };
            let elapsed = started.elapsed().as_secs_f64();

            if let Err(e) = write_output(&path, &response.content) {
                log.error(format!("❌ {e:#}"));
                continue;
            }
            match response.usage {
                Some(u) => log.info(format!(
                    "💾 {} ({:.2}s, {} prompt + {} completion tokens)",
                    path.display(), elapsed, u.prompt_tokens, u.completion_tokens
                )),
                None => log.info(format!("💾 {} ({:.2}s)", path.display(), elapsed)),
            }
            records.push(record(Some(elapsed), &response.content, false));
            part_outputs.push((variant, response.content));
        }

        if part_outputs.is_empty() {
            continue;
        }
        if !multi {
            let (_, text) = part_outputs.swap_remove(0);
            chunk_outputs.push((chunk, text));
            continue;
        }

        let _m = log.span(&SummarizePhase::Merge).entered();
        let merged_path = naming::merged_output_path(job.ai_dir, &base);
        let merged = merge_prompt_outputs(&part_outputs);
        if let Some(r) = write_merged(&merged_path, &merged, plan, Some(&chunk.chunk_id), job, log) {
            records.push(r);
        }
        chunk_outputs.push((chunk, merged));
    }

    if total > 1 && !chunk_outputs.is_empty() {
        let _m = log.span(&SummarizePhase::Merge).entered();
        if chunk_outputs.len() < total {
            log.warn(format!("⚠️  {}: only {}/{} chunk outputs available for the concatenated file", stem, chunk_outputs.len(), total));
        }
        let path = naming::document_output_path(job.ai_dir, &stem);
        let text = concatenate_chunk_outputs(&chunk_outputs, total);
        if let Some(r) = write_merged(&path, &text, plan, None, job, log) {
            records.push(r);
        }
    }
    records
}

fn write_merged(
    path: &Path,
    text: &str,
    plan: &ChunkPlan,
    chunk_id: Option<&str>,
    job: &DispatchJob<'_>,
    log: &LogCtx<Summarize>,
) -> Option<OutputRecord> {
    if let Err(e) = write_output(path, text) {
        log.error(format!("❌ {e:#}"));
        return None;
    }
    log.info(format!("🧩 merged → {}", path.display()));
    Some(OutputRecord {
        document: plan.document.clone(),
        chunk_id: chunk_id.map(str::to_string),
        label: MERGED_LABEL.to_string(),
        output_file: PathBuf::from(path),
        elapsed_secs: None,
        token_count: job.counter.count_tokens(text),
        word_count: count_words(text),
        reused: false,
    })
}

fn read_existing(path: &Path, log: &LogCtx<Summarize>) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            log.warn(format!("⚠️  cannot reuse {}: {e}; requesting again", path.display()));
            None
        }
    }
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}
