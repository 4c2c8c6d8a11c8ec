//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// voxsync - voice mute/deafen reconciliation
#[derive(Parser, Debug)]
#[command(name = "voxsync")]
#[command(version)]
#[command(about = "Keeps voice mute/deafen state in step with a live game")]
#[command(
    long_about = "voxsync mutes and deafens voice participants according to the game's phase and each player's status. These commands inspect the effective configuration and run a simulated game against an in-memory voice server."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the phase transition delay table
    Delays {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the mute/deafen policy for every phase and status
    Rules {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Play a scripted game against an in-memory voice server
    Simulate {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of players (1 to 12)
        #[arg(short, long, default_value_t = 6)]
        players: usize,

        /// Ignore the delay table
        #[arg(long, default_value_t = false)]
        skip_delays: bool,

        /// Simulated latency of every member update, in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
}
