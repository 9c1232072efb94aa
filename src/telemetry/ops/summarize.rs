use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Summarize;

#[derive(Copy, Clone, Debug)]
pub enum Phase { LoadSettings, ReadDocument, BuildPlan, SaveArtifacts, Dispatch, Merge }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::LoadSettings => "load_settings",
        Phase::ReadDocument => "read_document",
        Phase::BuildPlan => "build_plan",
        Phase::SaveArtifacts => "save_artifacts",
        Phase::Dispatch => "dispatch",
        Phase::Merge => "merge",
    }}
    fn span(&self) -> Span { match self {
        Phase::LoadSettings => info_span!("load_settings"),
        Phase::ReadDocument => info_span!("read_document"),
        Phase::BuildPlan => info_span!("build_plan"),
        Phase::SaveArtifacts => info_span!("save_artifacts"),
        Phase::Dispatch => info_span!("dispatch"),
        Phase::Merge => info_span!("merge"),
    }}
}

impl OpMarker for Summarize {
    const NAME: &'static str = "summarize";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("summarize") }
}
