//! Main entrypoint for the `groove-remote` command line tool.
//!
//! This binary is responsible for:
//! 1. Parsing arguments.
//! 2. Initializing logging (to stderr, so stdout stays machine-readable).
//! 3. Running the selected command against the server.

use clap::Parser;
use groove_remote_cli::{cli::Cli, commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    commands::run(cli).await
}
