//! Error types for the reconciler crate.

use thiserror::Error;
use voxsync_core::{GuildId, UserId};

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The voice-state snapshot for the guild could not be read.
    #[error("voice state for guild '{guild_id}' unavailable: {reason}")]
    SnapshotUnavailable { guild_id: GuildId, reason: String },

    /// A voice participant could not be resolved to a member.
    #[error("member '{user_id}' lookup failed: {reason}")]
    MemberLookupFailed { user_id: UserId, reason: String },

    /// The remote mute/deafen/nickname mutation failed.
    #[error("update of member '{user_id}' failed: {reason}")]
    UpdateFailed { user_id: UserId, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The periodic loop gave up.
    #[error("reconciliation loop aborted: {reason}")]
    LoopAborted { reason: String },

    /// Configuration could not be read or parsed.
    #[error(transparent)]
    Config(#[from] voxsync_core::Error),
}

impl Error {
    /// Create a snapshot unavailable error.
    pub fn snapshot_unavailable(guild_id: GuildId, reason: impl Into<String>) -> Self {
        Self::SnapshotUnavailable {
            guild_id,
            reason: reason.into(),
        }
    }

    /// Create a member lookup error.
    pub fn member_lookup_failed(user_id: UserId, reason: impl Into<String>) -> Self {
        Self::MemberLookupFailed {
            user_id,
            reason: reason.into(),
        }
    }

    /// Create an update failed error.
    pub fn update_failed(user_id: UserId, reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            user_id,
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a loop aborted error.
    pub fn loop_aborted(reason: impl Into<String>) -> Self {
        Self::LoopAborted {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_unavailable_display() {
        let err = Error::snapshot_unavailable(GuildId::from("g-1"), "gateway not ready");
        let msg = err.to_string();
        assert!(msg.contains("g-1"));
        assert!(msg.contains("gateway not ready"));
    }

    #[test]
    fn test_update_failed_display() {
        let err = Error::update_failed(UserId::from("u-9"), "429 too many requests");
        assert!(err.to_string().contains("u-9"));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: Error = voxsync_core::Error::toml_parse_failed("expected `=`").into();
        assert_eq!(err.to_string(), "TOML parse error: expected `=`");
    }
}
