//! Backoffice CLI
//!
//! Talks to the Backoffice REST API through the authenticated gateway:
//! - `login` / `logout` manage the stored token pair
//! - `get` / `post` / `put` / `patch` / `delete` call any endpoint
//!
//! Tokens live in `~/.backoffice/credentials.json` unless `--data-dir` says
//! otherwise.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    commands::run(cli).await
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
