//! In-process stand-in for the remote chat service.
//!
//! [`InMemoryVoiceState`] serves the voice snapshot, resolves members, and
//! applies patches back onto its own snapshot, so a reconciler wired to it
//! converges the way it would against the real service.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use voxsync_core::{ChannelId, GuildId, UserId};

use crate::directory::MemberProfile;
use crate::error::{Error, Result};
use crate::remote::{MemberResolver, MemberUpdater, VoiceStateSource};
use crate::rules::VoiceFlags;
use crate::types::{MemberPatch, VoiceParticipant};

#[derive(Debug)]
struct Inner {
    participants: BTreeMap<UserId, VoiceParticipant>,
    members: HashMap<UserId, MemberProfile>,
    available: bool,
    failing: HashSet<UserId>,
    latency: Duration,
    patches: Vec<MemberPatch>,
}

/// Voice snapshot, member table, and patch log for a single guild.
#[derive(Debug)]
pub struct InMemoryVoiceState {
    inner: RwLock<Inner>,
}

impl Default for InMemoryVoiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVoiceState {
    /// An empty, available snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                participants: BTreeMap::new(),
                members: HashMap::new(),
                available: true,
                failing: HashSet::new(),
                latency: Duration::ZERO,
                patches: Vec::new(),
            }),
        }
    }

    /// Delay every update by `latency` before acknowledging it.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        let mut inner = self.inner.into_inner();
        inner.latency = latency;
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Make a member resolvable.
    pub async fn add_member(&self, profile: MemberProfile) {
        self.inner
            .write()
            .await
            .members
            .insert(profile.user_id.clone(), profile);
    }

    /// Put a participant into voice, replacing any previous entry.
    pub async fn join(&self, participant: VoiceParticipant) {
        self.inner
            .write()
            .await
            .participants
            .insert(participant.user_id.clone(), participant);
    }

    /// Register a member and connect them, unmuted, to a channel.
    pub async fn join_member(&self, profile: MemberProfile, channel_id: impl Into<ChannelId>) {
        let participant = VoiceParticipant::new(profile.user_id.clone(), channel_id);
        self.add_member(profile).await;
        self.join(participant).await;
    }

    /// Disconnect a member from voice.
    pub async fn leave(&self, user_id: &UserId) -> Option<VoiceParticipant> {
        self.inner.write().await.participants.remove(user_id)
    }

    /// Change a participant's flags from outside the engine.
    pub async fn set_flags(&self, user_id: &UserId, flags: VoiceFlags) -> bool {
        self.inner
            .write()
            .await
            .participants
            .get_mut(user_id)
            .is_some_and(|participant| {
                participant.mute = flags.mute;
                participant.deaf = flags.deaf;
                true
            })
    }

    /// Toggle whether a snapshot can be read.
    pub async fn set_available(&self, available: bool) {
        self.inner.write().await.available = available;
    }

    /// Make every update for a member fail.
    pub async fn fail_updates_for(&self, user_id: impl Into<UserId>) {
        self.inner.write().await.failing.insert(user_id.into());
    }

    /// Let updates for a member succeed again.
    pub async fn heal(&self, user_id: &UserId) {
        self.inner.write().await.failing.remove(user_id);
    }

    /// Current entry of a participant.
    pub async fn participant(&self, user_id: &UserId) -> Option<VoiceParticipant> {
        self.inner.read().await.participants.get(user_id).cloned()
    }

    /// Current nickname of a member.
    pub async fn nickname(&self, user_id: &UserId) -> Option<String> {
        self.inner
            .read()
            .await
            .members
            .get(user_id)
            .and_then(|profile| profile.nickname.clone())
    }

    /// Every patch acknowledged so far, oldest first.
    pub async fn applied_patches(&self) -> Vec<MemberPatch> {
        self.inner.read().await.patches.clone()
    }
}

#[async_trait]
impl VoiceStateSource for InMemoryVoiceState {
    async fn voice_states(&self, guild_id: &GuildId) -> Result<Vec<VoiceParticipant>> {
        let inner = self.inner.read().await;
        if !inner.available {
            return Err(Error::snapshot_unavailable(
                guild_id.clone(),
                "voice state cache is not ready",
            ));
        }
        Ok(inner.participants.values().cloned().collect())
    }
}

#[async_trait]
impl MemberResolver for InMemoryVoiceState {
    async fn resolve_member(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Option<MemberProfile>> {
        let inner = self.inner.read().await;
        if !inner.available {
            return Err(Error::member_lookup_failed(
                user_id.clone(),
                "member cache is not ready",
            ));
        }
        Ok(inner.members.get(user_id).cloned())
    }
}

#[async_trait]
impl MemberUpdater for InMemoryVoiceState {
    async fn update_member(&self, patch: &MemberPatch) -> Result<()> {
        let latency = self.inner.read().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.write().await;
        if inner.failing.contains(&patch.user_id) {
            return Err(Error::update_failed(
                patch.user_id.clone(),
                "missing permissions",
            ));
        }

        if let Some(participant) = inner.participants.get_mut(&patch.user_id) {
            participant.mute = patch.mute;
            participant.deaf = patch.deaf;
        }
        if let (Some(nickname), Some(profile)) =
            (&patch.nickname, inner.members.get_mut(&patch.user_id))
        {
            profile.nickname = Some(nickname.clone());
        }
        debug!(user_id = %patch.user_id, mute = patch.mute, deaf = patch.deaf, "Patch applied");
        inner.patches.push(patch.clone());
        Ok(())
    }
}
