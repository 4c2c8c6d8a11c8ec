//! Seams to the remote chat service.
//!
//! The engine never talks to the network itself; the bot client implements
//! these traits over its own cache and HTTP session.

use async_trait::async_trait;
use voxsync_core::{GuildId, UserId};

use crate::directory::MemberProfile;
use crate::error::Result;
use crate::types::{MemberPatch, VoiceParticipant};

/// Source of the authoritative voice-state snapshot.
#[async_trait]
pub trait VoiceStateSource: Send + Sync {
    /// Everyone currently connected to voice in the guild.
    ///
    /// # Errors
    ///
    /// Fails when no consistent snapshot is available; the caller then skips
    /// the whole pass.
    async fn voice_states(&self, guild_id: &GuildId) -> Result<Vec<VoiceParticipant>>;
}

/// Resolves members missing from the directory.
#[async_trait]
pub trait MemberResolver: Send + Sync {
    /// Look a member up remotely. `Ok(None)` means the member is unknown.
    ///
    /// # Errors
    ///
    /// Fails when the remote lookup itself fails.
    async fn resolve_member(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Option<MemberProfile>>;
}

/// Applies mute/deafen/nickname to one member.
///
/// Applying the same patch twice must be harmless.
#[async_trait]
pub trait MemberUpdater: Send + Sync {
    /// Issue the mutation and wait for the remote acknowledgement.
    ///
    /// # Errors
    ///
    /// Fails when the remote call fails; the failure is contained to this
    /// member.
    async fn update_member(&self, patch: &MemberPatch) -> Result<()>;
}
