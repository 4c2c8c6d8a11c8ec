//! # voxsync-core
//!
//! Identifiers, game phases, and error plumbing shared by every voxsync crate.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod result;
pub mod types;

pub use error::Error;
pub use result::{GenericResultExt, OptionExt, Result};
pub use types::{ChannelId, GuildId, Phase, UserId};
