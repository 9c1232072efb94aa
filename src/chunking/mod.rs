//! Token-budgeted chunking of markdown documents.
//!
//! Pipeline per document: decide (planner) -> segment -> limit -> pack -> finalize totals
//! -> stitch overlap. Every stage is a pure transformation over an ordered list, so
//! documents can be planned independently of one another.

pub mod limit;
pub mod pack;
pub mod planner;
pub mod segment;
pub mod stitch;
pub mod types;
pub mod wrap;

pub use planner::build_plan;
pub use types::{ChunkPlan, ChunkPolicy, ChunkingMode, MarkdownChunk, PromptVariant};
