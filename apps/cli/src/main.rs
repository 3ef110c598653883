//! ConceptScribe CLI — autonomous documentation research agent.
//!
//! Turns a topic keyword into an llms.txt concept set: an index file plus
//! one detail file per discovered concept.

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
