pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn plan() -> LogCtx<ops::plan::Plan> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn summarize() -> LogCtx<ops::summarize::Summarize> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
