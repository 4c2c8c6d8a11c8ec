//! Event entry points for one guild.
//!
//! [`GuildSession`] turns game and chat events into directory, tracking and
//! game-state mutations followed by the right reconciliation pass.

use std::sync::Arc;

use tracing::{debug, info, warn};
use voxsync_core::{Phase, UserId};

use crate::directory::PlayerData;
use crate::error::Result;
use crate::r#loop::{LoopConfig, ReconciliationLoop};
use crate::reconciler::Reconciler;
use crate::tracking::TrackedChannel;
use crate::types::{PriorityMode, VoiceParticipant};

/// A guild following one game.
#[derive(Debug)]
pub struct GuildSession {
    reconciler: Arc<Reconciler>,
}

impl GuildSession {
    /// Wrap a reconciler.
    #[must_use]
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
        }
    }

    /// The underlying engine.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Periodic sweep over this session's engine.
    #[must_use]
    pub fn sweeper(&self, config: LoopConfig) -> ReconciliationLoop {
        ReconciliationLoop::new(Arc::clone(&self.reconciler), config)
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        self.reconciler.game().phase().await
    }

    /// Begin following a new game, optionally in a voice channel.
    pub async fn start_game(&self, channel: Option<TrackedChannel>) {
        self.clear_game_tracking().await;

        if let Some(channel) = channel {
            info!(
                guild_id = %self.reconciler.guild_id(),
                channel_id = %channel.channel_id,
                channel = %channel.channel_name,
                "Tracking voice channel"
            );
            self.reconciler.tracking().add_tracked_channel(channel).await;
        }
    }

    /// Wrap up the game: revive everyone, return to the lobby, release voice,
    /// then forget the game.
    ///
    /// # Errors
    ///
    /// Propagates an unavailable snapshot. Game tracking is cleared anyway.
    pub async fn end_game(&self) -> Result<bool> {
        self.reconciler.game().set_all_alive().await;
        self.reconciler.directory().set_all_alive().await;
        self.reconciler.game().set_phase(Phase::Lobby).await;

        let outcome = self.reconciler.reconcile(0, PriorityMode::None).await;
        self.clear_game_tracking().await;
        info!(guild_id = %self.reconciler.guild_id(), "Game ended");
        outcome
    }

    /// Move the game to `next` and reconcile after the configured delay.
    ///
    /// Returns `Ok(false)` without reconciling when the phase is unchanged.
    ///
    /// # Errors
    ///
    /// Propagates an unavailable snapshot.
    pub async fn transition_phase(&self, next: Phase) -> Result<bool> {
        let previous = self.reconciler.game().set_phase(next).await;
        if previous == next {
            debug!(phase = %next, "Phase unchanged");
            return Ok(false);
        }

        if previous == Phase::Lobby {
            self.reconciler.game().set_all_alive().await;
            self.reconciler.directory().set_all_alive().await;
        }

        let delay_secs = self.reconciler.config().delays.get_delay(previous, next);
        let mode = PriorityMode::for_transition(previous, next);
        info!(
            guild_id = %self.reconciler.guild_id(),
            from = %previous,
            to = %next,
            delay_secs,
            "Phase transition"
        );

        self.reconciler.reconcile(delay_secs, mode).await
    }

    /// Record fresh in-game data for a player.
    ///
    /// Returns how many linked members picked the change up.
    pub async fn ingest_player(&self, player: PlayerData) -> usize {
        let touched = self.reconciler.directory().refresh_player(&player).await;
        let color = player.color.clone();
        let alive = player.alive;
        self.reconciler.game().upsert_player(player).await;
        debug!(
            color = %color,
            alive,
            touched,
            players = self.reconciler.game().player_count().await,
            "Player data updated"
        );
        touched
    }

    /// Link a member to the player wearing `color`, then reconcile.
    ///
    /// # Errors
    ///
    /// Propagates an unavailable snapshot.
    pub async fn link_player(&self, user_id: &UserId, color: &str) -> Result<bool> {
        if self.reconciler.lookup_or_add(user_id).await.is_none() {
            return Ok(false);
        }

        match self.reconciler.game().get_by_color(color).await {
            Some(player) => {
                self.reconciler
                    .directory()
                    .update_player_data(user_id, &player)
                    .await;
                info!(user_id = %user_id, color, name = %player.name, "Linked player");
            }
            None => warn!(user_id = %user_id, color, "No player with that color"),
        }

        self.reconciler.reconcile(0, PriorityMode::None).await
    }

    /// Drop a member's link, then reconcile.
    ///
    /// # Errors
    ///
    /// Propagates an unavailable snapshot.
    pub async fn unlink_player(&self, user_id: &UserId) -> Result<bool> {
        if self.reconciler.directory().clear_player_data(user_id).await {
            info!(user_id = %user_id, "Unlinked player");
        }
        self.reconciler.reconcile(0, PriorityMode::None).await
    }

    /// A member joined, left, or toggled flags in voice.
    ///
    /// # Errors
    ///
    /// Propagates an unavailable snapshot.
    pub async fn voice_state_changed(&self, update: &VoiceParticipant) -> Result<bool> {
        self.reconciler.handle_voice_state_update(update).await
    }

    /// Forget player links, the player table, and tracked channels.
    pub async fn clear_game_tracking(&self) {
        self.reconciler.directory().clear_all_player_data().await;
        self.reconciler.game().clear_all_player_data().await;
        self.reconciler.tracking().reset().await;
    }
}
