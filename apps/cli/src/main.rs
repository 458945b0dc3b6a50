//! Ushanka CLI — Archivematica-to-Fedora preservation ingest tool.
//!
//! Moves stored AIP/DIP package pairs out of the Archivematica Storage
//! Service and deposits them in Fedora as compound objects with one part
//! per DIP payload file.

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
