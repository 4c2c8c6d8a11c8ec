//! Per-guild cache of member records.
//!
//! Every event handler of a guild shares one [`UserDirectory`]. Reads take a
//! shared lock, writes an exclusive one, and the two operations the engine
//! relies on for correctness ([`UserDirectory::try_propose`] and
//! [`UserDirectory::confirm_if_settled`]) check and flip the pending flag
//! inside a single write section.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use voxsync_core::UserId;

/// In-game player data a member can be linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Player color, lower case (`"red"`, `"lime"`, ...).
    pub color: String,
    /// In-game name.
    pub name: String,
    pub alive: bool,
}

impl PlayerData {
    /// A living player.
    pub fn new(color: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            name: name.into(),
            alive: true,
        }
    }

    /// Set the alive flag.
    #[must_use]
    pub const fn with_alive(mut self, alive: bool) -> Self {
        self.alive = alive;
        self
    }
}

/// Member profile as known to the remote chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub username: String,
    /// Guild nickname; `None` when the member has none.
    pub nickname: Option<String>,
}

impl MemberProfile {
    /// A profile without a nickname.
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            nickname: None,
        }
    }

    /// Set the nickname.
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
}

/// Cached state of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    /// Current display name in the guild (nickname, or username without one).
    pub nickname: String,
    /// Linked player's in-game name, empty when unlinked.
    pub player_name: String,
    /// Linked player's color.
    pub color: Option<String>,
    pub alive: bool,
    pub linked: bool,
    /// Set between issuing a mutation and seeing it in the voice snapshot.
    pub pending_voice_update: bool,
}

impl UserRecord {
    /// A fresh, unlinked record.
    #[must_use]
    pub fn from_profile(profile: MemberProfile) -> Self {
        let nickname = profile
            .nickname
            .unwrap_or_else(|| profile.username.clone());
        Self {
            user_id: profile.user_id,
            username: profile.username,
            nickname,
            player_name: String::new(),
            color: None,
            alive: true,
            linked: false,
            pending_voice_update: false,
        }
    }

    fn link(&mut self, player: &PlayerData) {
        self.linked = true;
        self.alive = player.alive;
        self.player_name.clone_from(&player.name);
        self.color = Some(player.color.clone());
    }

    fn unlink(&mut self) {
        self.linked = false;
        self.alive = true;
        self.player_name.clear();
        self.color = None;
    }
}

/// Concurrency-safe map from member id to [`UserRecord`].
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl UserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a member's record.
    pub async fn get(&self, user_id: &UserId) -> Option<UserRecord> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Number of cached members.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether no member is cached.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Cache a member resolved from the remote side.
    ///
    /// An existing record keeps its link and pending state; only the names
    /// are refreshed.
    pub async fn add_full_user(&self, profile: MemberProfile) -> UserRecord {
        let mut users = self.users.write().await;
        match users.get_mut(&profile.user_id) {
            Some(existing) => {
                existing.nickname = profile
                    .nickname
                    .unwrap_or_else(|| profile.username.clone());
                existing.username = profile.username;
                existing.clone()
            }
            None => {
                let record = UserRecord::from_profile(profile);
                users.insert(record.user_id.clone(), record.clone());
                record
            }
        }
    }

    /// Link a member to an in-game player.
    ///
    /// Returns `false` when the member is not cached.
    pub async fn update_player_data(&self, user_id: &UserId, player: &PlayerData) -> bool {
        let mut users = self.users.write().await;
        users.get_mut(user_id).is_some_and(|record| {
            record.link(player);
            debug!(user_id = %user_id, color = %player.color, "Linked member to player");
            true
        })
    }

    /// Drop a member's link to their player.
    ///
    /// Returns `false` when the member is not cached.
    pub async fn clear_player_data(&self, user_id: &UserId) -> bool {
        let mut users = self.users.write().await;
        users.get_mut(user_id).is_some_and(|record| {
            record.unlink();
            true
        })
    }

    /// Unlink every member. Records stay cached.
    pub async fn clear_all_player_data(&self) {
        self.users
            .write()
            .await
            .values_mut()
            .for_each(UserRecord::unlink);
    }

    /// Copy fresh in-game data onto every member linked to that color.
    ///
    /// Returns how many members were touched.
    pub async fn refresh_player(&self, player: &PlayerData) -> usize {
        let mut users = self.users.write().await;
        let mut touched = 0_usize;
        for record in users
            .values_mut()
            .filter(|record| record.linked && record.color.as_deref() == Some(player.color.as_str()))
        {
            record.link(player);
            touched = touched.saturating_add(1);
        }
        touched
    }

    /// Mark every member alive.
    pub async fn set_all_alive(&self) {
        self.users
            .write()
            .await
            .values_mut()
            .for_each(|record| record.alive = true);
    }

    /// Record the display name a member now has.
    pub async fn set_nickname(&self, user_id: &UserId, nickname: &str) {
        if let Some(record) = self.users.write().await.get_mut(user_id) {
            nickname.clone_into(&mut record.nickname);
        }
    }

    /// Atomically propose a change for a member.
    ///
    /// Under one write lock: when the member exists and has no outstanding
    /// request, `decide` inspects the record; if it returns `Some`, the
    /// pending flag is set before the lock is released. A member with a
    /// request in flight is never offered to `decide`.
    pub async fn try_propose<T, F>(&self, user_id: &UserId, decide: F) -> Option<T>
    where
        F: FnOnce(&UserRecord) -> Option<T>,
    {
        let mut users = self.users.write().await;
        let record = users.get_mut(user_id)?;
        if record.pending_voice_update {
            debug!(user_id = %user_id, "Request already in flight");
            return None;
        }
        let proposal = decide(record)?;
        record.pending_voice_update = true;
        Some(proposal)
    }

    /// Atomically clear a member's pending flag once `settled` agrees.
    ///
    /// Returns `true` when the flag went from set to clear.
    pub async fn confirm_if_settled<F>(&self, user_id: &UserId, settled: F) -> bool
    where
        F: FnOnce(&UserRecord) -> bool,
    {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(record) if record.pending_voice_update && settled(record) => {
                record.pending_voice_update = false;
                true
            }
            _ => false,
        }
    }

    /// Members with a request in flight.
    pub async fn pending_users(&self) -> Vec<UserId> {
        let mut pending: Vec<UserId> = self
            .users
            .read()
            .await
            .values()
            .filter(|record| record.pending_voice_update)
            .map(|record| record.user_id.clone())
            .collect();
        pending.sort();
        pending
    }
}
