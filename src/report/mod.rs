//! Everything written or logged about a plan after the engine is done with it.

pub mod artifacts;
pub mod diagnostics;
pub mod naming;

pub use artifacts::save_chunk_plan;
pub use diagnostics::{diagnostic_lines, OutputRecord};
