pub mod plan;
pub mod summarize;
