//! # voxsync
//!
//! Entry point for the voxsync CLI.
//!
//! Parses arguments, installs the tracing subscriber (`RUST_LOG` overrides the
//! default `info` filter) and hands the command to the dispatcher.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use voxsync::cli::Cli;
use voxsync::commands::execute_command;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    execute_command(cli.command)
        .await
        .inspect_err(|e| error!(error = %e, "Command failed"))
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
