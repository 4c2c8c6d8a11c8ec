//! Voice mute/deafen reconciliation for a live game.
//!
//! This crate keeps every voice participant's server mute/deafen flags in
//! line with the game's phase and each player's status:
//!
//! - **Desired state**: [`VoiceRules`] maps phase, alive and tracked status to
//!   a pair of flags
//! - **Actual state**: the voice snapshot served by a [`VoiceStateSource`]
//! - **Diff**: linked members whose flags (or nickname) drifted
//! - **Apply**: a [`DispatchQueue`] drains changes highest priority first,
//!   one concurrent cohort at a time
//!
//! # Key Concepts
//!
//! ## Pending updates
//!
//! Proposing a change marks the member pending inside the same write lock
//! that compared the states. No second request for that member is issued
//! until a verification pass sees the first one land.
//!
//! ## Phase transitions
//!
//! [`GuildSession::transition_phase`] waits for the delay in [`PhaseDelays`]
//! and favours whoever has to be silenced first.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voxsync_core::Phase;
//! use voxsync_reconciler::{GuildSession, InMemoryVoiceState, Reconciler, TrackedChannel};
//!
//! #[tokio::main]
//! async fn main() -> voxsync_reconciler::Result<()> {
//!     let remote = Arc::new(InMemoryVoiceState::new());
//!     let reconciler = Reconciler::builder("guild").with_remote(remote).build()?;
//!     let session = GuildSession::new(reconciler);
//!
//!     session.start_game(Some(TrackedChannel::new("vc", "Among Us"))).await;
//!     session.transition_phase(Phase::Tasks).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod delays;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod game;
pub mod r#loop;
pub mod memory;
pub mod reconciler;
pub mod remote;
pub mod rules;
pub mod session;
pub mod tracking;
pub mod types;

// Re-export main types
pub use config::ReconcilerConfig;
pub use delays::PhaseDelays;
pub use directory::{MemberProfile, PlayerData, UserDirectory, UserRecord};
pub use dispatch::{Cohort, DispatchQueue, DrainReport};
pub use error::{Error, Result};
pub use game::GameState;
pub use r#loop::{LoopConfig, LoopStopper, ReconciliationLoop};
pub use memory::InMemoryVoiceState;
pub use reconciler::{PassReport, Reconciler, ReconcilerBuilder};
pub use remote::{MemberResolver, MemberUpdater, VoiceStateSource};
pub use rules::{PhaseRule, PlayerStatus, VoiceFlags, VoiceRules};
pub use session::GuildSession;
pub use tracking::{TrackedChannel, TrackingSet};
pub use types::{MemberPatch, PendingChange, PriorityMode, VoiceParticipant};
