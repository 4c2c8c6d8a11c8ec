//! Core types for the reconciler.

use serde::{Deserialize, Serialize};
use voxsync_core::{ChannelId, GuildId, Phase, UserId};

use crate::rules::VoiceFlags;

/// One member currently connected to voice, as reported by the remote side.
///
/// The flags here are the authoritative "actual" state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceParticipant {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub mute: bool,
    pub deaf: bool,
}

impl VoiceParticipant {
    /// A participant with both flags off.
    pub fn new(user_id: impl Into<UserId>, channel_id: impl Into<ChannelId>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            mute: false,
            deaf: false,
        }
    }

    /// Set the observed flags.
    #[must_use]
    pub fn with_flags(mut self, flags: VoiceFlags) -> Self {
        self.mute = flags.mute;
        self.deaf = flags.deaf;
        self
    }

    /// Observed flags.
    #[must_use]
    pub const fn flags(&self) -> VoiceFlags {
        VoiceFlags::new(self.mute, self.deaf)
    }
}

/// Parameters of a single remote "set member audio state" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPatch {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub deaf: bool,
    pub mute: bool,
    /// New display name; `None` leaves the nickname alone.
    pub nickname: Option<String>,
}

impl MemberPatch {
    /// Requested flags.
    #[must_use]
    pub const fn flags(&self) -> VoiceFlags {
        VoiceFlags::new(self.mute, self.deaf)
    }
}

/// A proposed mutation waiting in the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Higher drains first.
    pub priority: i32,
    pub patch: MemberPatch,
}

impl PendingChange {
    /// Build a change for one member.
    pub fn new(
        priority: i32,
        guild_id: GuildId,
        user_id: UserId,
        want: VoiceFlags,
        nickname: Option<String>,
    ) -> Self {
        Self {
            priority,
            patch: MemberPatch {
                guild_id,
                user_id,
                deaf: want.deaf,
                mute: want.mute,
                nickname,
            },
        }
    }

    /// The member this change targets.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.patch.user_id
    }
}

/// Which group of players gets their change applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriorityMode {
    /// Everybody in one cohort.
    #[default]
    None,
    /// Living players first.
    PreferAlive,
    /// Dead players first.
    PreferDead,
}

impl PriorityMode {
    /// Priority for a member: 1 when the mode favours their status, else 0.
    #[must_use]
    pub const fn priority_for(self, alive: bool) -> i32 {
        match self {
            Self::PreferAlive if alive => 1,
            Self::PreferDead if !alive => 1,
            _ => 0,
        }
    }

    /// Mode for a phase transition.
    ///
    /// Whoever has to be silenced goes first: living players when tasks
    /// resume after a meeting, ghosts when a meeting starts. Leaving the
    /// lobby marks everyone alive, so ordering buys nothing there.
    #[must_use]
    pub const fn for_transition(previous: Phase, next: Phase) -> Self {
        match (previous, next) {
            (Phase::Lobby, _) | (_, Phase::Lobby) => Self::None,
            (_, Phase::Tasks) => Self::PreferAlive,
            (_, Phase::Discuss) => Self::PreferDead,
        }
    }
}
