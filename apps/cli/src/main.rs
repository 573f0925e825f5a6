//! IssuePress CLI: monthly newsletter to e-reader publishing pipeline.
//!
//! Finds the requested issue, converts it to EPUB and MOBI with a generated
//! cover, adds both to the Calibre library and updates the site repository.

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
