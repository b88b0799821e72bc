//! kbsync CLI: keeps knowledge-base pages mirrored to a help center.
//!
//! Acts as a minimal host: seeds and edits pages, fires the lifecycle
//! triggers that drive synchronization, and shows revision history.

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
