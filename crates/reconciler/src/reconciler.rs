//! Reconciliation engine.
//!
//! One pass reads the authoritative voice snapshot, clears pending flags whose
//! mutation has landed, recomputes every participant's desired flags, proposes
//! changes for linked members that drifted, and drains the proposals through
//! the priority queue.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use voxsync_core::{GenericResultExt, GuildId, OptionExt, Phase, UserId};

use crate::config::ReconcilerConfig;
use crate::directory::{UserDirectory, UserRecord};
use crate::dispatch::{DispatchQueue, DrainReport};
use crate::error::{Error, Result};
use crate::game::GameState;
use crate::remote::{MemberResolver, MemberUpdater, VoiceStateSource};
use crate::rules::{PlayerStatus, VoiceFlags, VoiceRules};
use crate::tracking::TrackingSet;
use crate::types::{PendingChange, PriorityMode, VoiceParticipant};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Changes proposed, and therefore marked pending.
    pub proposed: usize,
    /// Seconds slept before draining.
    pub delay_secs: u64,
    /// Pending flags cleared by the verification pass.
    pub confirmed: usize,
    pub drain: DrainReport,
}

impl PassReport {
    /// Whether the pass proposed at least one change.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.proposed > 0
    }
}

/// Snapshot as seen by the verification pass.
#[derive(Debug, Default)]
struct Verified {
    /// Participants with a directory record.
    known: Vec<VoiceParticipant>,
    /// Participants no record could be resolved for.
    skipped: Vec<UserId>,
    confirmed: usize,
}

/// Keeps one guild's voice flags in line with its game.
pub struct Reconciler {
    guild_id: GuildId,
    directory: Arc<UserDirectory>,
    tracking: Arc<TrackingSet>,
    game: Arc<GameState>,
    voice: Arc<dyn VoiceStateSource>,
    resolver: Arc<dyn MemberResolver>,
    updater: Arc<dyn MemberUpdater>,
    config: ReconcilerConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("guild_id", &self.guild_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Start building a reconciler for a guild.
    pub fn builder(guild_id: impl Into<GuildId>) -> ReconcilerBuilder {
        ReconcilerBuilder::new(guild_id)
    }

    /// Run a full pass and report whether anything was proposed.
    ///
    /// Blocks for `delay_secs` between proposing and draining when it is
    /// positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotUnavailable`] when the voice snapshot cannot
    /// be read; nothing is proposed in that case.
    pub async fn reconcile(&self, delay_secs: u64, mode: PriorityMode) -> Result<bool> {
        self.reconcile_with_report(delay_secs, mode)
            .await
            .map(|report| report.changed())
    }

    /// Run a full pass and return the detailed outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotUnavailable`] when the voice snapshot cannot
    /// be read.
    pub async fn reconcile_with_report(
        &self,
        delay_secs: u64,
        mode: PriorityMode,
    ) -> Result<PassReport> {
        let verified = self.verify().await?;
        let phase = self.game.phase().await;

        info!(
            guild_id = %self.guild_id,
            phase = %phase,
            participants = verified.known.len(),
            skipped = verified.skipped.len(),
            delay_secs,
            priority_mode = ?mode,
            "Starting reconciliation"
        );

        let mut queue = DispatchQueue::new();
        for participant in &verified.known {
            if let Some(change) = self.propose(participant, phase, mode).await {
                queue.push(change);
            }
        }
        let proposed = queue.len();

        if delay_secs > 0 {
            info!(delay_secs, "Sleeping before applying changes to users");
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        let drain = self.drain(queue).await;

        if proposed == 0 {
            info!(guild_id = %self.guild_id, "Voice state converged");
        } else if drain.all_succeeded() {
            info!(
                guild_id = %self.guild_id,
                proposed,
                issued = drain.total(),
                "Reconciliation complete"
            );
        } else {
            warn!(
                guild_id = %self.guild_id,
                proposed,
                issued = drain.total(),
                applied = drain.applied.len(),
                failed = drain.failed.len(),
                aborted = drain.aborted,
                "Reconciliation complete with failed updates"
            );
        }

        Ok(PassReport {
            proposed,
            delay_secs,
            confirmed: verified.confirmed,
            drain,
        })
    }

    /// Re-read the snapshot and clear pending flags that have landed.
    ///
    /// Returns the participants that resolved to a member, so a caller can
    /// keep working from them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotUnavailable`] when the voice snapshot cannot
    /// be read.
    pub async fn verify_voice_state_changes(&self) -> Result<Vec<VoiceParticipant>> {
        self.verify().await.map(|verified| verified.known)
    }

    /// React to a single member's voice-state change.
    ///
    /// Runs the verification pass, then applies the usual proposal rule to
    /// that member alone and dispatches immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotUnavailable`] when the voice snapshot cannot
    /// be read.
    pub async fn handle_voice_state_update(&self, update: &VoiceParticipant) -> Result<bool> {
        let verified = self.verify().await?;
        if verified.skipped.contains(&update.user_id) {
            return Ok(false);
        }
        if self.lookup_or_add(&update.user_id).await.is_none() {
            return Ok(false);
        }

        let phase = self.game.phase().await;
        let Some(change) = self.propose(update, phase, PriorityMode::None).await else {
            return Ok(false);
        };

        let mut queue = DispatchQueue::new();
        queue.push(change);
        self.drain(queue).await;
        info!(user_id = %update.user_id, "Applied voice change from voice state update");
        Ok(true)
    }

    async fn verify(&self) -> Result<Verified> {
        let snapshot = self.snapshot().await?;
        let phase = self.game.phase().await;
        let rules = &self.config.voice_rules;
        let apply_nicknames = self.config.apply_nicknames;
        let mut verified = Verified::default();

        for participant in snapshot {
            if self.lookup_or_add(&participant.user_id).await.is_none() {
                verified.skipped.push(participant.user_id);
                continue;
            }
            let in_tracked_channel = self.tracking.is_tracked(&participant.channel_id).await;
            let actual = participant.flags();
            // A rename counts as landed only once its acknowledgement refreshed
            // the cached nickname.
            let settled = self
                .directory
                .confirm_if_settled(&participant.user_id, |record| {
                    desired_flags(rules, record, in_tracked_channel, phase) == actual
                        && expected_nickname(record, apply_nicknames)
                            .is_none_or(|nickname| nickname == record.nickname)
                })
                .await;
            if settled {
                debug!(user_id = %participant.user_id, "Pending voice update confirmed");
                verified.confirmed = verified.confirmed.saturating_add(1);
            }
            verified.known.push(participant);
        }

        Ok(verified)
    }

    async fn snapshot(&self) -> Result<Vec<VoiceParticipant>> {
        self.voice
            .voice_states(&self.guild_id)
            .await
            .map_err(|e| match e {
                Error::SnapshotUnavailable { .. } => e,
                other => Error::snapshot_unavailable(self.guild_id.clone(), other.to_string()),
            })
            .tap_err(|e| warn!(guild_id = %self.guild_id, error = %e, "Skipping reconciliation"))
    }

    /// Directory record for a participant, resolving it remotely on a miss.
    ///
    /// A failed or empty resolution skips the participant.
    pub(crate) async fn lookup_or_add(&self, user_id: &UserId) -> Option<UserRecord> {
        if let Some(record) = self.directory.get(user_id).await {
            return Some(record);
        }

        let profile = self
            .resolver
            .resolve_member(&self.guild_id, user_id)
            .await
            .tap_err(|e| warn!(user_id = %user_id, error = %e, "Member lookup failed"))
            .ok()
            .flatten()
            .tap_none(|| warn!(user_id = %user_id, "Member unknown, skipping"))?;

        Some(self.directory.add_full_user(profile).await)
    }

    /// Propose a change for one participant if it drifted.
    ///
    /// Decided and marked pending under the directory's write lock.
    async fn propose(
        &self,
        participant: &VoiceParticipant,
        phase: Phase,
        mode: PriorityMode,
    ) -> Option<PendingChange> {
        let in_tracked_channel = self.tracking.is_tracked(&participant.channel_id).await;
        let actual = participant.flags();
        let rules = &self.config.voice_rules;
        let apply_nicknames = self.config.apply_nicknames;
        let guild_id = &self.guild_id;

        self.directory
            .try_propose(&participant.user_id, |record| {
                if !record.linked {
                    return None;
                }
                let want = desired_flags(rules, record, in_tracked_channel, phase);
                let nickname = expected_nickname(record, apply_nicknames);
                let rename = nickname
                    .as_deref()
                    .is_some_and(|expected| expected != record.nickname);

                if want == actual && !rename {
                    debug!(
                        user_id = %record.user_id,
                        mute = want.mute,
                        deaf = want.deaf,
                        "Already in the desired state"
                    );
                    return None;
                }

                Some(PendingChange::new(
                    mode.priority_for(record.alive),
                    guild_id.clone(),
                    record.user_id.clone(),
                    want,
                    nickname,
                ))
            })
            .await
            .tap_some(|change| {
                debug!(
                    user_id = %change.user_id(),
                    mute = change.patch.mute,
                    deaf = change.patch.deaf,
                    priority = change.priority,
                    "Proposed voice change"
                );
            })
    }

    async fn drain(&self, queue: DispatchQueue) -> DrainReport {
        if queue.is_empty() {
            return DrainReport::default();
        }

        let report = queue
            .drain(Arc::clone(&self.updater), self.config.max_concurrent_updates)
            .await;

        for patch in &report.applied {
            if let Some(nickname) = &patch.nickname {
                self.directory.set_nickname(&patch.user_id, nickname).await;
            }
        }

        report
    }

    /// Guild this reconciler serves.
    #[must_use]
    pub const fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    /// Shared member directory.
    #[must_use]
    pub const fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Shared tracked-channel set.
    #[must_use]
    pub const fn tracking(&self) -> &Arc<TrackingSet> {
        &self.tracking
    }

    /// Shared game state.
    #[must_use]
    pub const fn game(&self) -> &Arc<GameState> {
        &self.game
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

fn desired_flags(
    rules: &VoiceRules,
    record: &UserRecord,
    in_tracked_channel: bool,
    phase: Phase,
) -> VoiceFlags {
    let status = PlayerStatus {
        alive: record.alive,
        tracked: in_tracked_channel,
        linked: record.linked,
    };
    rules.evaluate(status, phase)
}

/// The in-game name to push as nickname, when renaming is on and one is known.
fn expected_nickname(record: &UserRecord, apply_nicknames: bool) -> Option<String> {
    (apply_nicknames && !record.player_name.is_empty()).then(|| record.player_name.clone())
}

/// Builder for [`Reconciler`].
pub struct ReconcilerBuilder {
    guild_id: GuildId,
    directory: Option<Arc<UserDirectory>>,
    tracking: Option<Arc<TrackingSet>>,
    game: Option<Arc<GameState>>,
    voice: Option<Arc<dyn VoiceStateSource>>,
    resolver: Option<Arc<dyn MemberResolver>>,
    updater: Option<Arc<dyn MemberUpdater>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new(guild_id: impl Into<GuildId>) -> Self {
        Self {
            guild_id: guild_id.into(),
            directory: None,
            tracking: None,
            game: None,
            voice: None,
            resolver: None,
            updater: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Share an existing member directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Share an existing tracked-channel set.
    #[must_use]
    pub fn with_tracking(mut self, tracking: Arc<TrackingSet>) -> Self {
        self.tracking = Some(tracking);
        self
    }

    /// Share an existing game state.
    #[must_use]
    pub fn with_game(mut self, game: Arc<GameState>) -> Self {
        self.game = Some(game);
        self
    }

    /// Set the voice snapshot source.
    #[must_use]
    pub fn with_voice_source(mut self, voice: Arc<dyn VoiceStateSource>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Set the member resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn MemberResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the member updater.
    #[must_use]
    pub fn with_updater(mut self, updater: Arc<dyn MemberUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    /// Use one object for all three remote seams.
    #[must_use]
    pub fn with_remote<R>(self, remote: Arc<R>) -> Self
    where
        R: VoiceStateSource + MemberResolver + MemberUpdater + 'static,
    {
        let voice: Arc<dyn VoiceStateSource> = remote.clone();
        let resolver: Arc<dyn MemberResolver> = remote.clone();
        let updater: Arc<dyn MemberUpdater> = remote;
        self.with_voice_source(voice)
            .with_resolver(resolver)
            .with_updater(updater)
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Rename linked members to their in-game name.
    #[must_use]
    pub const fn apply_nicknames(mut self, enabled: bool) -> Self {
        self.config.apply_nicknames = enabled;
        self
    }

    /// Bound concurrent updates per cohort; 0 means unbounded.
    #[must_use]
    pub const fn max_concurrent_updates(mut self, max: usize) -> Self {
        self.config.max_concurrent_updates = max;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a remote seam is missing.
    pub fn build(self) -> Result<Reconciler> {
        let voice = self
            .voice
            .ok_or_else(|| Error::invalid_config("Voice state source is required"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| Error::invalid_config("Member resolver is required"))?;
        let updater = self
            .updater
            .ok_or_else(|| Error::invalid_config("Member updater is required"))?;

        Ok(Reconciler {
            guild_id: self.guild_id,
            directory: self.directory.unwrap_or_default(),
            tracking: self.tracking.unwrap_or_default(),
            game: self.game.unwrap_or_default(),
            voice,
            resolver,
            updater,
            config: self.config,
        })
    }
}
