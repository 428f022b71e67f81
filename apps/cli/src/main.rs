//! tabreport CLI — bucket-to-document ingestion pipeline.
//!
//! Runs the bucket poller, the document service, and the config management
//! commands that glue them together.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
