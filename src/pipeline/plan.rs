use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::chunking::build_plan;
use crate::report::save_chunk_plan;
use crate::telemetry::{self};
use crate::telemetry::ops::plan::Phase as PlanPhase;
use crate::tokenizer::build_counter;

use super::{read_document, ChunkArgs, DocumentSummary};

/// Plan chunking for each document and write the plan artifacts. Never calls the model.
#[derive(Args, Debug)]
pub struct PlanCmd {
    #[command(flatten)]
    pub chunk: ChunkArgs,
}

pub fn run(args: PlanCmd) -> Result<()> {
    let log = telemetry::plan();
    let _g = log.root_span_kv(args.chunk.describe()).entered();

    let _s = log.span(&PlanPhase::LoadSettings).entered();
    let settings = args.chunk.settings();
    settings.ensure_directories(false)?;
    let prompts = settings.prompt_variants(None);
    let parts = prompts.len().max(1);
    let policy = settings.chunk_policy(prompts);
    let counter = build_counter(&settings.token_counter_model)
        .with_context(|| format!("load token counter {}", settings.token_counter_model))?;
    let files = args.chunk.resolve_inputs(&settings)?;
    drop(_s);

    if files.is_empty() {
        log.info(format!("ℹ️  No markdown files found in {}", settings.md_input_dir.display()));
        return Ok(());
    }
    log.info(format!(
        "📝 Planning {} document(s) — model={} context_limit={:?} target={} max={} overlap={}",
        files.len(),
        settings.openai_model,
        policy.context_limit,
        policy.target_tokens,
        policy.max_tokens,
        policy.overlap_tokens
    ));

    let mut documents: Vec<DocumentSummary> = Vec::new();
    let mut failed = 0usize;
    for path in files {
        let _r = log.span(&PlanPhase::ReadDocument).entered();
        let markdown = match read_document(&path) {
            Ok(text) => text,
            Err(e) => {
                log.error(format!("❌ {e:#}"));
                failed += 1;
                continue;
            }
        };
        drop(_r);

        let _b = log.span(&PlanPhase::BuildPlan).entered();
        let plan = build_plan(&path, &markdown, &policy, counter.as_ref());
        drop(_b);

        let _sa = log.span(&PlanPhase::SaveArtifacts).entered();
        let (plan_json, chunk_map) = match save_chunk_plan(&plan, &settings, parts) {
            Ok(paths) => paths,
            Err(e) => {
                log.error(format!("❌ {}: {e:#}", path.display()));
                failed += 1;
                continue;
            }
        };
        drop(_sa);

        log.plan_overview(&plan, parts);
        log.info(format!("   💾 {} · {}", plan_json.display(), chunk_map.display()));
        documents.push(DocumentSummary::new(&plan, parts, plan_json, chunk_map));
    }

    log.info(format!("✅ Planned {} document(s), {} failed", documents.len(), failed));

    if telemetry::config::json_mode() {
        #[derive(Serialize)]
        struct PlanResult { prompt_parts: usize, failed: usize, documents: Vec<DocumentSummary> }
        log.result(&PlanResult { prompt_parts: parts, failed, documents })?;
    }
    Ok(())
}
