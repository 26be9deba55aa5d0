//! Hubmirror CLI entry point
//!
//! Mirrors container images into a registry namespace and writes a script
//! that restores their original names.

use clap::Parser;
use hubmirror::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    hubmirror::cli::execute(cli).await
}
