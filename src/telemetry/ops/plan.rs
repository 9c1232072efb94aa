use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Plan;

#[derive(Copy, Clone, Debug)]
pub enum Phase { LoadSettings, ReadDocument, BuildPlan, SaveArtifacts }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::LoadSettings => "load_settings",
        Phase::ReadDocument => "read_document",
        Phase::BuildPlan => "build_plan",
        Phase::SaveArtifacts => "save_artifacts",
    }}
    fn span(&self) -> Span { match self {
        Phase::LoadSettings => info_span!("load_settings"),
        Phase::ReadDocument => info_span!("read_document"),
        Phase::BuildPlan => info_span!("build_plan"),
        Phase::SaveArtifacts => info_span!("save_artifacts"),
    }}
}

impl OpMarker for Plan {
    const NAME: &'static str = "plan";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("plan") }
}
