//! Game-side state of a guild: current phase and the in-game player table.

use std::collections::HashMap;

use tokio::sync::RwLock;
use voxsync_core::Phase;

use crate::directory::PlayerData;

/// Phase and players of the game a guild is following.
#[derive(Debug, Default)]
pub struct GameState {
    phase: RwLock<Phase>,
    players: RwLock<HashMap<String, PlayerData>>,
}

impl GameState {
    /// A game sitting in the lobby with no players.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    /// Move to a new phase, returning the one it replaced.
    pub async fn set_phase(&self, next: Phase) -> Phase {
        std::mem::replace(&mut *self.phase.write().await, next)
    }

    /// Insert or replace a player, keyed by color.
    pub async fn upsert_player(&self, player: PlayerData) {
        self.players
            .write()
            .await
            .insert(player.color.clone(), player);
    }

    /// Player wearing a color.
    pub async fn get_by_color(&self, color: &str) -> Option<PlayerData> {
        self.players.read().await.get(color).cloned()
    }

    /// Revive every player.
    pub async fn set_all_alive(&self) {
        self.players
            .write()
            .await
            .values_mut()
            .for_each(|player| player.alive = true);
    }

    /// Forget every player.
    pub async fn clear_all_player_data(&self) {
        self.players.write().await.clear();
    }

    /// Number of known players.
    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }
}
