use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, error, info, trace, warn, Span};

use crate::chunking::ChunkPlan;
use crate::output::config::OutputConfig;
use crate::output::types::Envelope;
use crate::output::Emitter;

use super::config;

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), "start");
        } else {
            info!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span {
        trace!(op = %self.op_name(), phase = ph.name(), "enter phase");
        ph.span()
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }
    pub fn error(&self, msg: impl AsRef<str>) { if self.json { error!(op = %self.op_name(), "{}", msg.as_ref()); } else { error!("{}", msg.as_ref()); } }

    /// One line per document plus one per chunk; structured fields in JSON log mode.
    pub fn plan_overview(&self, plan: &ChunkPlan, parts: usize) {
        let name = plan.document.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tokens = plan.estimated_input_tokens(parts);
        if self.json {
            info!(
                op = %self.op_name(),
                document = %name,
                chunks = plan.chunks.len(),
                mode = %plan.applied_mode,
                reason = %plan.reason,
                estimated_input_tokens = tokens,
                estimated_cost = ?plan.estimated_cost(parts),
                "plan_summary"
            );
        } else {
            info!("📝 {} ⇒ {} chunk(s) | mode={} | reason={}", name, plan.chunks.len(), plan.applied_mode, plan.reason);
            match plan.estimated_cost(parts) {
                Some(cost) => info!("   · estimated input: {} tokens (~US$ {:.4})", tokens, cost),
                None => info!("   · estimated input: {} tokens", tokens),
            }
        }
        for chunk in &plan.chunks {
            if self.json {
                debug!(op = %self.op_name(), chunk_id = %chunk.chunk_id, tokens = chunk.token_count, words = chunk.word_count, start_line = chunk.start_line, end_line = chunk.end_line, "chunk");
            } else {
                info!(
                    "   · {}: {} tokens | {} words | lines {}-{}",
                    chunk.chunk_id, chunk.token_count, chunk.word_count, chunk.start_line, chunk.end_line
                );
            }
        }
    }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> { emit(&Envelope::plan(self.op_name(), plan)?) }
    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> { emit(&Envelope::result(self.op_name(), result)?) }
}

fn emit(env: &Envelope) -> Result<()> {
    let emitter = Emitter::new(OutputConfig::from_env(config::json_mode()));
    emitter.emit(env).map_err(anyhow::Error::from)
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}
