//! Voice channels that belong to the running game.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use voxsync_core::ChannelId;

/// A voice channel designated for the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChannel {
    pub channel_id: ChannelId,
    pub channel_name: String,
    /// Channel reserved for dead players.
    pub for_ghosts: bool,
}

impl TrackedChannel {
    /// A regular (non-ghost) channel.
    pub fn new(channel_id: impl Into<ChannelId>, channel_name: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            for_ghosts: false,
        }
    }

    /// A channel for dead players.
    pub fn ghosts(channel_id: impl Into<ChannelId>, channel_name: impl Into<String>) -> Self {
        Self {
            for_ghosts: true,
            ..Self::new(channel_id, channel_name)
        }
    }
}

/// Set of tracked channels for the active game.
#[derive(Debug, Default)]
pub struct TrackingSet {
    channels: RwLock<HashMap<ChannelId, TrackedChannel>>,
}

impl TrackingSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a channel, replacing any previous entry for it.
    pub async fn add_tracked_channel(&self, channel: TrackedChannel) {
        self.channels
            .write()
            .await
            .insert(channel.channel_id.clone(), channel);
    }

    /// Pure membership test.
    pub async fn is_tracked(&self, channel_id: &ChannelId) -> bool {
        self.channels.read().await.contains_key(channel_id)
    }

    /// Whether the channel is tracked and reserved for dead players.
    pub async fn is_ghost_channel(&self, channel_id: &ChannelId) -> bool {
        self.channels
            .read()
            .await
            .get(channel_id)
            .is_some_and(|c| c.for_ghosts)
    }

    /// Tracked channels ordered by id.
    pub async fn channels(&self) -> Vec<TrackedChannel> {
        let mut channels: Vec<_> = self.channels.read().await.values().cloned().collect();
        channels.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        channels
    }

    /// Forget every channel.
    pub async fn reset(&self) {
        self.channels.write().await.clear();
    }
}
