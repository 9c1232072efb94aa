use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod chunking;
mod config;
mod llm;
mod output;
mod pipeline;
mod report;
mod telemetry;
mod tokenizer;

#[derive(Parser)]
#[command(name = "digest", about = "Token-budgeted markdown chunking and summarization")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build chunk plans and write the plan artifacts
    Plan(pipeline::plan::PlanCmd),
    /// Build chunk plans and send every chunk to the model
    Summarize(pipeline::summarize::SummarizeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // stderr logging; respects RUST_LOG and DIGEST_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Plan(args) => pipeline::plan::run(args)?,
        Commands::Summarize(args) => pipeline::summarize::run(args).await?,
    }

    Ok(())
}
