//! Shared harness for reconciler behaviour tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use voxsync_core::UserId;
use voxsync_reconciler::{
    GuildSession, InMemoryVoiceState, MemberPatch, MemberProfile, MemberUpdater, PlayerData,
    Reconciler, ReconcilerConfig, Result, TrackedChannel, UserDirectory, VoiceFlags,
    VoiceParticipant,
};

pub const CHANNEL: &str = "vc-game";
pub const LOUNGE: &str = "vc-lounge";

/// What the updater saw.
#[derive(Debug, Clone)]
pub enum Call {
    Started {
        user_id: UserId,
        at: Instant,
        pending: bool,
    },
    Finished {
        user_id: UserId,
        at: Instant,
    },
}

/// Updater that records every call, then forwards it to the in-memory remote.
pub struct Recorder {
    remote: Arc<InMemoryVoiceState>,
    directory: Arc<UserDirectory>,
    latency: HashMap<UserId, Duration>,
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn started(&self) -> Vec<UserId> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                Call::Started { user_id, .. } => Some(user_id.clone()),
                Call::Finished { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl MemberUpdater for Recorder {
    async fn update_member(&self, patch: &MemberPatch) -> Result<()> {
        let pending = self
            .directory
            .get(&patch.user_id)
            .await
            .is_some_and(|record| record.pending_voice_update);
        self.calls.lock().await.push(Call::Started {
            user_id: patch.user_id.clone(),
            at: Instant::now(),
            pending,
        });

        if let Some(latency) = self.latency.get(&patch.user_id) {
            tokio::time::sleep(*latency).await;
        }
        let outcome = self.remote.update_member(patch).await;

        self.calls.lock().await.push(Call::Finished {
            user_id: patch.user_id.clone(),
            at: Instant::now(),
        });
        outcome
    }
}

pub struct Harness {
    pub remote: Arc<InMemoryVoiceState>,
    pub recorder: Arc<Recorder>,
    pub session: GuildSession,
}

impl Harness {
    pub fn reconciler(&self) -> &Reconciler {
        self.session.reconciler()
    }

    pub fn directory(&self) -> &Arc<UserDirectory> {
        self.session.reconciler().directory()
    }

    /// Put a linked player into the game channel with the given flags.
    pub async fn seat(&self, user: &str, color: &str, alive: bool, flags: VoiceFlags) {
        self.seat_in(user, color, alive, flags, CHANNEL).await;
    }

    pub async fn seat_in(&self, user: &str, color: &str, alive: bool, flags: VoiceFlags, channel: &str) {
        let user_id = UserId::from(user);
        let player = PlayerData::new(color, format!("{color}-player")).with_alive(alive);
        self.remote
            .add_member(MemberProfile::new(user, format!("{user}-name")))
            .await;
        self.remote
            .join(VoiceParticipant::new(user, channel).with_flags(flags))
            .await;
        self.reconciler().game().upsert_player(player.clone()).await;
        self.directory()
            .add_full_user(MemberProfile::new(user, format!("{user}-name")))
            .await;
        self.directory().update_player_data(&user_id, &player).await;
    }

    /// Put an unlinked member (a bot, a guest) into a channel.
    pub async fn guest(&self, user: &str, flags: VoiceFlags) {
        self.remote
            .add_member(MemberProfile::new(user, format!("{user}-name")))
            .await;
        self.remote
            .join(VoiceParticipant::new(user, CHANNEL).with_flags(flags))
            .await;
    }

    pub async fn flags(&self, user: &str) -> Option<VoiceFlags> {
        self.remote
            .participant(&UserId::from(user))
            .await
            .map(|participant| participant.flags())
    }

    pub async fn pending(&self, user: &str) -> bool {
        self.directory()
            .get(&UserId::from(user))
            .await
            .is_some_and(|record| record.pending_voice_update)
    }
}

pub async fn harness(config: ReconcilerConfig) -> Result<Harness> {
    harness_with_latency(config, HashMap::new()).await
}

pub async fn harness_with_latency(
    config: ReconcilerConfig,
    latency: HashMap<UserId, Duration>,
) -> Result<Harness> {
    let remote = Arc::new(InMemoryVoiceState::new());
    let directory = Arc::new(UserDirectory::new());
    let recorder = Arc::new(Recorder {
        remote: Arc::clone(&remote),
        directory: Arc::clone(&directory),
        latency,
        calls: Mutex::new(Vec::new()),
    });

    let reconciler = Reconciler::builder("guild-1")
        .with_directory(directory)
        .with_voice_source(remote.clone())
        .with_resolver(remote.clone())
        .with_updater(recorder.clone())
        .with_config(config)
        .build()?;
    let session = GuildSession::new(reconciler);
    session
        .start_game(Some(TrackedChannel::new(CHANNEL, "Among Us")))
        .await;

    Ok(Harness {
        remote,
        recorder,
        session,
    })
}
