//! noticescore CLI: Section 508 risk scoring for nightly procurement notices.
//!
//! Links each notice in a nightly feed to its attachments, normalizes the
//! attachment text, and scores it with a frozen classifier.

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
