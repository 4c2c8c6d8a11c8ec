//! Voice policy: which (mute, deaf) flags a player should have.
//!
//! The policy is data. [`VoiceRules`] maps a phase plus the player's
//! tracked/alive status to a pair of flags and never encodes game rules of its
//! own; the defaults mirror how the game is usually played over voice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voxsync_core::Phase;

/// Desired or observed audio flags for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceFlags {
    /// Server-muted.
    pub mute: bool,
    /// Server-deafened.
    pub deaf: bool,
}

impl VoiceFlags {
    /// Flags with everything off.
    pub const OPEN: Self = Self {
        mute: false,
        deaf: false,
    };

    /// Build flags from explicit values.
    #[must_use]
    pub const fn new(mute: bool, deaf: bool) -> Self {
        Self { mute, deaf }
    }
}

/// Status inputs for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStatus {
    /// Alive in the game.
    pub alive: bool,
    /// Sitting in a tracked voice channel.
    pub tracked: bool,
    /// Linked to an in-game player.
    pub linked: bool,
}

impl PlayerStatus {
    /// A member counts as tracked only when linked as well, so bots and
    /// guests sharing the channel are never touched.
    #[must_use]
    pub const fn effective_tracked(self) -> bool {
        self.tracked && self.linked
    }
}

/// Flags for the four tracked/alive combinations of one phase.
///
/// Combinations missing from a config file fall back to [`VoiceFlags::OPEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseRule {
    pub tracked_alive: VoiceFlags,
    pub tracked_dead: VoiceFlags,
    pub untracked_alive: VoiceFlags,
    pub untracked_dead: VoiceFlags,
}

impl PhaseRule {
    const fn select(&self, tracked: bool, alive: bool) -> VoiceFlags {
        match (tracked, alive) {
            (true, true) => self.tracked_alive,
            (true, false) => self.tracked_dead,
            (false, true) => self.untracked_alive,
            (false, false) => self.untracked_dead,
        }
    }
}

/// Phase-indexed voice policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceRules {
    phases: BTreeMap<Phase, PhaseRule>,
}

impl Default for VoiceRules {
    fn default() -> Self {
        let tasks = PhaseRule {
            tracked_alive: VoiceFlags::new(true, true),
            ..PhaseRule::default()
        };
        let discuss = PhaseRule {
            tracked_dead: VoiceFlags::new(true, false),
            ..PhaseRule::default()
        };

        Self::empty()
            .with_phase(Phase::Lobby, PhaseRule::default())
            .with_phase(Phase::Tasks, tasks)
            .with_phase(Phase::Discuss, discuss)
    }
}

impl VoiceRules {
    /// A policy that never mutes or deafens anybody.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            phases: BTreeMap::new(),
        }
    }

    /// Replace the rule for one phase.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase, rule: PhaseRule) -> Self {
        self.phases.insert(phase, rule);
        self
    }

    /// The rule for a phase, if one is configured.
    #[must_use]
    pub fn rule(&self, phase: Phase) -> Option<&PhaseRule> {
        self.phases.get(&phase)
    }

    /// Apply the policy to one member.
    ///
    /// Total over every input: an unconfigured phase yields open flags.
    #[must_use]
    pub fn evaluate(&self, status: PlayerStatus, phase: Phase) -> VoiceFlags {
        self.phases
            .get(&phase)
            .map_or(VoiceFlags::OPEN, |rule| {
                rule.select(status.effective_tracked(), status.alive)
            })
    }
}
