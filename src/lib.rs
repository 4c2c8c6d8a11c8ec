#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # voxsync
//!
//! Keeps voice mute/deafen state in step with a live game.
//!
//! This library re-exports the workspace crates and hosts the CLI.

// Re-export all crates
pub use voxsync_core;
pub use voxsync_reconciler;

pub mod cli;
pub mod commands;
