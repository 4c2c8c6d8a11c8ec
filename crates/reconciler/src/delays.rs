//! Seconds to wait after a phase change before touching anybody's voice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voxsync_core::Phase;

/// Origin phase -> destination phase -> delay in seconds.
///
/// Lookups never fail: a pair missing from the table means no delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseDelays {
    delays: BTreeMap<Phase, BTreeMap<Phase, u64>>,
}

impl Default for PhaseDelays {
    fn default() -> Self {
        Self::empty()
            .with_delay(Phase::Lobby, Phase::Lobby, 0)
            .with_delay(Phase::Lobby, Phase::Tasks, 7)
            .with_delay(Phase::Lobby, Phase::Discuss, 0)
            .with_delay(Phase::Tasks, Phase::Lobby, 1)
            .with_delay(Phase::Tasks, Phase::Tasks, 0)
            .with_delay(Phase::Tasks, Phase::Discuss, 0)
            .with_delay(Phase::Discuss, Phase::Lobby, 6)
            .with_delay(Phase::Discuss, Phase::Tasks, 7)
            .with_delay(Phase::Discuss, Phase::Discuss, 0)
    }
}

impl PhaseDelays {
    /// A table with no delays at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            delays: BTreeMap::new(),
        }
    }

    /// Set one entry.
    #[must_use]
    pub fn with_delay(mut self, origin: Phase, dest: Phase, seconds: u64) -> Self {
        self.delays.entry(origin).or_default().insert(dest, seconds);
        self
    }

    /// Delay for a transition, 0 when the pair is not configured.
    #[must_use]
    pub fn get_delay(&self, origin: Phase, dest: Phase) -> u64 {
        self.delays
            .get(&origin)
            .and_then(|row| row.get(&dest))
            .copied()
            .unwrap_or(0)
    }
}
