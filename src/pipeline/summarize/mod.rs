pub mod dispatch;
pub mod prompt;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::Instrument;

use crate::chunking::{build_plan, ChunkPlan, PromptVariant};
use crate::config::Settings;
use crate::llm::openai::{OpenAiClient, OpenAiClientConfig};
use crate::llm::OpenAiError;
use crate::report::{diagnostic_lines, save_chunk_plan, OutputRecord};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::summarize::Summarize;
use crate::telemetry::{self};
use crate::telemetry::ops::summarize::Phase as SummarizePhase;
use crate::tokenizer::build_counter;

use self::dispatch::{dispatch_plan, DispatchJob};
use super::{read_document, ChunkArgs, DocumentSummary};

/// Plan every document, then send each chunk to the model once per prompt variant.
#[derive(Args, Debug)]
pub struct SummarizeCmd {
    #[command(flatten)]
    pub chunk: ChunkArgs,
    #[arg(long)] pub ai_dir: Option<PathBuf>,
    /// Inline system prompt
    #[arg(long, conflicts_with = "system_prompt_file")] pub system_prompt: Option<String>,
    #[arg(long)] pub system_prompt_file: Option<PathBuf>,
    /// Single user prompt template replacing the configured prompt parts
    #[arg(long)] pub user_prompt_file: Option<PathBuf>,
    /// Keep outputs that already exist instead of requesting them again
    #[arg(long, default_value_t = false)] pub skip_existing_ai: bool,
    /// Plan and report estimates without calling the model
    #[arg(long, default_value_t = false)] pub dry_run: bool,
}

impl SummarizeCmd {
    fn apply_overrides(&self, settings: &mut Settings) -> Result<()> {
        if let Some(dir) = &self.ai_dir { settings.ai_output_dir = dir.clone(); }
        if let Some(text) = &self.system_prompt { settings.system_prompt = text.clone(); }
        if let Some(path) = &self.system_prompt_file {
            settings.system_prompt = fs::read_to_string(path)
                .with_context(|| format!("read system prompt {}", path.display()))?
                .trim()
                .to_string();
        }
        if self.skip_existing_ai { settings.skip_existing_ai_outputs = true; }
        Ok(())
    }

    fn user_prompt_override(&self) -> Result<Option<String>> {
        let Some(path) = &self.user_prompt_file else { return Ok(None) };
        let text = fs::read_to_string(path).with_context(|| format!("read user prompt {}", path.display()))?;
        Ok(Some(text))
    }
}

#[derive(Serialize)]
struct PromptSummary { label: String, display: String, source: String }

impl From<&PromptVariant> for PromptSummary {
    fn from(v: &PromptVariant) -> Self {
        Self {
            label: v.label.clone(),
            display: v.display.clone(),
            source: v.path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "inline".into()),
        }
    }
}

pub async fn run(args: SummarizeCmd) -> Result<()> {
    let log = telemetry::summarize();
    let mut kv = args.chunk.describe();
    kv.push(("dry_run", args.dry_run.to_string()));
    kv.push(("skip_existing_ai", args.skip_existing_ai.to_string()));
    let root = log.root_span_kv(kv);
    summarize_documents(args, &log).instrument(root).await
}

async fn summarize_documents(args: SummarizeCmd, log: &LogCtx<Summarize>) -> Result<()> {
    let _s = log.span(&SummarizePhase::LoadSettings).entered();
    let mut settings = args.chunk.settings();
    args.apply_overrides(&mut settings)?;
    let user_override = args.user_prompt_override()?;
    settings.ensure_directories(!args.dry_run)?;
    let prompts = settings.prompt_variants(user_override.as_deref());
    let parts = prompts.len().max(1);
    let policy = settings.chunk_policy(prompts.clone());
    let counter = build_counter(&settings.token_counter_model)
        .with_context(|| format!("load token counter {}", settings.token_counter_model))?;
    let files = args.chunk.resolve_inputs(&settings)?;
    drop(_s);

    if files.is_empty() {
        log.warn(format!("⚠️  No markdown files available in {}", settings.md_input_dir.display()));
        return Ok(());
    }

    let mut plans: Vec<ChunkPlan> = Vec::new();
    let mut documents: Vec<DocumentSummary> = Vec::new();
    for path in files {
        let _r = log.span(&SummarizePhase::ReadDocument).entered();
        let markdown = match read_document(&path) {
            Ok(text) => text,
            Err(e) => {
                log.error(format!("❌ {e:#}"));
                continue;
            }
        };
        drop(_r);

        let _b = log.span(&SummarizePhase::BuildPlan).entered();
        let plan = build_plan(&path, &markdown, &policy, counter.as_ref());
        drop(_b);

        let _sa = log.span(&SummarizePhase::SaveArtifacts).entered();
        match save_chunk_plan(&plan, &settings, parts) {
            Ok((plan_json, chunk_map)) => documents.push(DocumentSummary::new(&plan, parts, plan_json, chunk_map)),
            Err(e) => log.error(format!("❌ {}: {e:#}", path.display())),
        }
        drop(_sa);
        plans.push(plan);
    }

    if args.dry_run {
        log.info(format!("[dry-run] {} document(s) prepared for model {}", plans.len(), settings.openai_model));
        log.info(format!("[dry-run] {} user prompt(s):", prompts.len()));
        for p in prompts.iter().map(PromptSummary::from) {
            log.info(format!("   - {} ({}) from {}", p.label, p.display, p.source));
        }
        for plan in &plans {
            log.plan_overview(plan, parts);
        }
        if telemetry::config::json_mode() {
            #[derive(Serialize)]
            struct SummarizePlan { model: String, prompts: Vec<PromptSummary>, documents: Vec<DocumentSummary> }
            let prompts = prompts.iter().map(PromptSummary::from).collect();
            log.plan(&SummarizePlan { model: settings.openai_model.clone(), prompts, documents })?;
        }
        return Ok(());
    }

    let client_cfg = OpenAiClientConfig::from_env();
    let mut outputs: Vec<OutputRecord> = Vec::new();
    if client_cfg.api_key.is_none() {
        log.error(format!("❌ Dispatch aborted: {}", OpenAiError::MissingApiKey));
    } else {
        let client = OpenAiClient::new(client_cfg).context("build OpenAI client")?;
        let job = DispatchJob {
            ai_dir: &settings.ai_output_dir,
            model: &settings.openai_model,
            system_prompt: &settings.system_prompt,
            prompts: &prompts,
            skip_existing: settings.skip_existing_ai_outputs,
            counter: counter.as_ref(),
        };
        for plan in &plans {
            log.plan_overview(plan, parts);
            let span = log.span(&SummarizePhase::Dispatch);
            let records = dispatch_plan(&client, plan, &job, log).instrument(span).await;
            outputs.extend(records);
        }
        let fresh = outputs.iter().filter(|r| !r.reused).count();
        if fresh == 0 {
            log.info("ℹ️  Summarize finished with no new outputs");
        } else {
            log.info(format!("✅ Wrote {} output file(s) to {}", fresh, settings.ai_output_dir.display()));
        }
    }

    for line in diagnostic_lines(&plans, &outputs, &prompts, &settings.ai_output_dir, counter.as_ref()) {
        log.info(line);
    }

    if telemetry::config::json_mode() {
        #[derive(Serialize)]
        struct SummarizeResult { model: String, documents: Vec<DocumentSummary>, outputs: Vec<OutputRecord> }
        log.result(&SummarizeResult { model: settings.openai_model.clone(), documents, outputs })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingMode;

    #[tokio::test]
    async fn dry_run_writes_plan_artifacts_only() {
        let tmp = tempfile::tempdir().unwrap();
        let md_dir = tmp.path().join("md");
        fs::create_dir_all(&md_dir).unwrap();
        fs::write(md_dir.join("case.md"), "# Case\n\nFirst finding.\n\n## Detail\n\nSecond finding.\n").unwrap();

        let args = SummarizeCmd {
            chunk: ChunkArgs {
                md_dir: Some(md_dir),
                metadata_dir: Some(tmp.path().join("meta")),
                chunking: Some(ChunkingMode::Force),
                chunk_target: Some(4),
                chunk_max: Some(6),
                chunk_overlap: Some(0),
                token_counter_model: Some("gpt-3.5-turbo".into()),
                ..ChunkArgs::default()
            },
            ai_dir: Some(tmp.path().join("ai")),
            system_prompt: Some("sys".into()),
            system_prompt_file: None,
            user_prompt_file: None,
            skip_existing_ai: false,
            dry_run: true,
        };
        run(args).await.unwrap();

        assert!(tmp.path().join("meta").join("case_chunks.json").is_file());
        assert!(tmp.path().join("meta").join("case_chunk_map.md").is_file());
        assert!(!tmp.path().join("ai").exists());
    }

    #[test]
    fn missing_system_prompt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let args = SummarizeCmd {
            chunk: ChunkArgs::default(),
            ai_dir: None,
            system_prompt: None,
            system_prompt_file: Some(tmp.path().join("absent.md")),
            user_prompt_file: None,
            skip_existing_ai: false,
            dry_run: true,
        };
        let mut settings = Settings::from_lookup(|_| None);
        let err = args.apply_overrides(&mut settings).unwrap_err();
        assert!(format!("{err:#}").contains("read system prompt"));
    }
}
