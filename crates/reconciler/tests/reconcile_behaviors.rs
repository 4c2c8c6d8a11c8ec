//! Reconciliation Behavioral Tests - BDD Style
//!
//! Following BDD naming convention: given_<context>_when_<action>_then_<outcome>
//!
//! These tests drive a guild session against the in-memory remote and record
//! every member update the engine issues.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Call, CHANNEL, LOUNGE, harness, harness_with_latency};
use tokio::time::Instant;
use voxsync_core::{Phase, UserId};
use voxsync_reconciler::{
    Error, MemberPatch, PriorityMode, ReconcilerConfig, Result, VoiceFlags, VoiceParticipant,
};

const MUTED_DEAF: VoiceFlags = VoiceFlags::new(true, true);
const MUTED: VoiceFlags = VoiceFlags::new(true, false);

// ============================================================================
// 1. CONVERGENCE
// ============================================================================

#[tokio::test]
async fn given_converged_guild_when_reconcile_twice_then_second_reports_no_change() -> Result<()> {
    // GIVEN: Two living players in the game channel during tasks
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.seat("u2", "blue", true, VoiceFlags::OPEN).await;

    // WHEN: Reconciling twice with no voice change in between
    let first = h.reconciler().reconcile(0, PriorityMode::None).await?;
    let second = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: Only the first pass changes anything
    assert!(first, "First pass should mute both players");
    assert!(!second, "Second pass should find nothing to do");
    assert_eq!(h.flags("u1").await, Some(MUTED_DEAF));
    assert_eq!(h.recorder.started().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn given_muted_alive_player_in_discussion_when_reconcile_then_unmute_proposed_and_pending_set()
-> Result<()> {
    // GIVEN: A linked, living player still muted when the meeting starts
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Discuss).await;
    h.seat("u1", "red", true, MUTED).await;
    assert!(!h.pending("u1").await, "Precondition: nothing in flight");

    // WHEN: Reconciling
    let report = h
        .reconciler()
        .reconcile_with_report(0, PriorityMode::None)
        .await?;

    // THEN: The player is unmuted and was pending before the request went out
    assert!(report.changed());
    assert_eq!(report.drain.applied.len(), 1);
    assert_eq!(
        report.drain.applied.first().map(MemberPatch::flags),
        Some(VoiceFlags::OPEN)
    );
    let calls = h.recorder.calls().await;
    assert!(matches!(
        calls.first(),
        Some(Call::Started { pending: true, .. })
    ));
    assert!(h.pending("u1").await, "Pending until verification sees it");
    assert_eq!(h.flags("u1").await, Some(VoiceFlags::OPEN));
    Ok(())
}

#[tokio::test]
async fn given_landed_update_when_verified_then_member_can_be_proposed_again() -> Result<()> {
    // GIVEN: A player muted by a first pass
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    assert!(h.reconciler().reconcile(0, PriorityMode::None).await?);
    assert!(h.pending("u1").await);

    // WHEN: A verification pass observes the new flags
    h.reconciler().verify_voice_state_changes().await?;

    // THEN: The pending flag is cleared
    assert!(!h.pending("u1").await);

    // AND WHEN: The player unmutes themselves
    h.remote
        .set_flags(&UserId::from("u1"), VoiceFlags::OPEN)
        .await;
    let changed = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: A fresh request is issued
    assert!(changed);
    assert_eq!(h.recorder.started().await.len(), 2);
    assert_eq!(h.flags("u1").await, Some(MUTED_DEAF));
    Ok(())
}

#[tokio::test]
async fn given_pending_member_when_drift_persists_then_no_second_request() -> Result<()> {
    // GIVEN: A player with a request that has not been verified
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.remote.fail_updates_for("u1").await;
    assert!(h.reconciler().reconcile(0, PriorityMode::None).await?);

    // WHEN: Reconciling again while the state is still wrong
    h.remote.heal(&UserId::from("u1")).await;
    let changed = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: Nothing is issued and the member stays pending
    assert!(!changed);
    assert_eq!(h.recorder.started().await.len(), 1);
    assert!(h.pending("u1").await);
    Ok(())
}

// ============================================================================
// 2. WHO GETS TOUCHED
// ============================================================================

#[tokio::test]
async fn given_unlinked_guest_in_tracked_channel_when_reconcile_any_phase_then_never_proposed()
-> Result<()> {
    // GIVEN: A music bot sitting deafened in the game channel
    let h = harness(ReconcilerConfig::default()).await?;
    h.guest("bot", MUTED_DEAF).await;

    for phase in Phase::ALL {
        // WHEN: Reconciling in every phase
        h.reconciler().game().set_phase(phase).await;
        let changed = h.reconciler().reconcile(0, PriorityMode::None).await?;

        // THEN: The bot is left alone
        assert!(!changed, "Guest must not be touched in {phase}");
    }
    assert!(h.recorder.calls().await.is_empty());
    assert_eq!(h.flags("bot").await, Some(MUTED_DEAF));
    Ok(())
}

#[tokio::test]
async fn given_player_outside_tracked_channel_when_tasks_then_left_talking() -> Result<()> {
    // GIVEN: A linked player who sits in another channel
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat_in("u1", "red", true, VoiceFlags::OPEN, LOUNGE).await;

    // WHEN: Reconciling
    let changed = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: Untracked players stay open
    assert!(!changed);
    assert_eq!(h.flags("u1").await, Some(VoiceFlags::OPEN));
    Ok(())
}

#[tokio::test]
async fn given_unknown_participant_when_reconcile_then_skipped_and_others_applied() -> Result<()> {
    // GIVEN: A participant the member resolver does not know, next to a player
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.remote.join(VoiceParticipant::new("stranger", CHANNEL)).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;

    // WHEN: Reconciling
    let changed = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: The stranger is skipped, the player is muted
    assert!(changed);
    assert!(h.directory().get(&UserId::from("stranger")).await.is_none());
    assert_eq!(h.flags("u1").await, Some(MUTED_DEAF));
    Ok(())
}

#[tokio::test]
async fn given_player_left_voice_when_reconcile_then_only_connected_members_updated() -> Result<()> {
    // GIVEN: Two players in tasks, one of whom has disconnected
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.seat("u2", "blue", true, VoiceFlags::OPEN).await;
    assert!(h.remote.leave(&UserId::from("u2")).await.is_some());

    // WHEN: Reconciling
    let report = h
        .reconciler()
        .reconcile_with_report(0, PriorityMode::None)
        .await?;

    // THEN: Only the connected player is touched
    assert_eq!(report.proposed, 1);
    assert_eq!(h.recorder.started().await, vec![UserId::from("u1")]);
    assert!(!h.pending("u2").await);
    Ok(())
}

// ============================================================================
// 3. FAILURES
// ============================================================================

#[tokio::test]
async fn given_one_failing_member_when_reconcile_then_others_still_applied() -> Result<()> {
    // GIVEN: Two players, updates for one of them fail
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.seat("u2", "blue", true, VoiceFlags::OPEN).await;
    h.remote.fail_updates_for("u1").await;

    // WHEN: Reconciling
    let report = h
        .reconciler()
        .reconcile_with_report(0, PriorityMode::None)
        .await?;

    // THEN: The failure is contained and left pending
    assert_eq!(report.proposed, 2);
    assert_eq!(report.drain.applied.len(), 1);
    assert_eq!(report.drain.failed.len(), 1);
    assert_eq!(
        report.drain.failed.first().map(|(user_id, _)| user_id),
        Some(&UserId::from("u1"))
    );
    assert_eq!(h.flags("u2").await, Some(MUTED_DEAF));
    assert_eq!(h.flags("u1").await, Some(VoiceFlags::OPEN));
    assert!(h.pending("u1").await);

    // AND WHEN: The player ends up in the desired state on their own
    h.remote.set_flags(&UserId::from("u1"), MUTED_DEAF).await;
    let report = h
        .reconciler()
        .reconcile_with_report(0, PriorityMode::None)
        .await?;

    // THEN: Verification releases them
    assert_eq!(report.confirmed, 2);
    assert!(!h.pending("u1").await);
    Ok(())
}

#[tokio::test]
async fn given_unavailable_snapshot_when_reconcile_then_error_and_nothing_pending() -> Result<()> {
    // GIVEN: A player that would need muting, but no voice snapshot
    let h = harness(ReconcilerConfig::default()).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.remote.set_available(false).await;

    // WHEN: Reconciling
    let result = h.reconciler().reconcile(0, PriorityMode::None).await;

    // THEN: The pass is aborted before proposing anything
    assert!(matches!(result, Err(Error::SnapshotUnavailable { .. })));
    assert!(!h.pending("u1").await);
    assert!(h.recorder.calls().await.is_empty());
    Ok(())
}

// ============================================================================
// 4. PHASE TRANSITIONS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn given_lobby_when_tasks_start_then_changes_wait_seven_seconds() -> Result<()> {
    // GIVEN: A player in the lobby, with the default delay table
    let h = harness(ReconcilerConfig::default()).await?;
    h.seat("u1", "red", false, VoiceFlags::OPEN).await;
    let started = Instant::now();

    // WHEN: The game moves to tasks
    let changed = h.session.transition_phase(Phase::Tasks).await?;

    // THEN: Nothing is applied before the delay, and everyone was revived
    assert!(changed);
    assert!(started.elapsed() >= Duration::from_secs(7));
    let calls = h.recorder.calls().await;
    assert!(matches!(
        calls.first(),
        Some(Call::Started { at, .. }) if at.duration_since(started) >= Duration::from_secs(7)
    ));
    assert_eq!(h.flags("u1").await, Some(MUTED_DEAF));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn given_meeting_ends_when_tasks_resume_then_living_cohort_finishes_first() -> Result<()> {
    // GIVEN: Two living and two dead players at the end of a meeting, with
    // the living players' updates being slow
    let latency = HashMap::from([
        (UserId::from("alive-1"), Duration::from_millis(30)),
        (UserId::from("alive-2"), Duration::from_millis(50)),
        (UserId::from("dead-1"), Duration::from_millis(5)),
        (UserId::from("dead-2"), Duration::from_millis(5)),
    ]);
    let h = harness_with_latency(ReconcilerConfig::default(), latency).await?;
    h.reconciler().game().set_phase(Phase::Discuss).await;
    h.seat("alive-1", "red", true, VoiceFlags::OPEN).await;
    h.seat("alive-2", "blue", true, VoiceFlags::OPEN).await;
    h.seat("dead-1", "lime", false, MUTED).await;
    h.seat("dead-2", "pink", false, MUTED).await;

    // WHEN: Tasks resume
    assert!(h.session.transition_phase(Phase::Tasks).await?);

    // THEN: Every living player's update finishes before any dead player's starts
    let calls = h.recorder.calls().await;
    let is_alive = |user: &UserId| user.as_str().starts_with("alive");
    let last_alive_finish = calls
        .iter()
        .rposition(|call| matches!(call, Call::Finished { user_id, .. } if is_alive(user_id)));
    let first_dead_start = calls
        .iter()
        .position(|call| matches!(call, Call::Started { user_id, .. } if !is_alive(user_id)));
    assert!(
        matches!((last_alive_finish, first_dead_start), (Some(a), Some(d)) if a < d),
        "Dead cohort started before the living cohort finished: {calls:?}"
    );
    assert_eq!(h.flags("alive-1").await, Some(MUTED_DEAF));
    assert_eq!(h.flags("dead-1").await, Some(VoiceFlags::OPEN));
    Ok(())
}

#[tokio::test]
async fn given_same_phase_when_transition_then_no_pass() -> Result<()> {
    // GIVEN: A guild already in the lobby
    let h = harness(ReconcilerConfig::default()).await?;
    h.seat("u1", "red", true, MUTED_DEAF).await;

    // WHEN: Transitioning to the lobby again
    let changed = h.session.transition_phase(Phase::Lobby).await?;

    // THEN: Nothing runs
    assert!(!changed);
    assert!(h.recorder.calls().await.is_empty());
    Ok(())
}

// ============================================================================
// 5. CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_passes_when_reconcile_then_each_member_updated_once() -> Result<()> {
    // GIVEN: Several players whose updates take a while
    let latency = ["u1", "u2", "u3"]
        .into_iter()
        .map(|user| (UserId::from(user), Duration::from_millis(20)))
        .collect();
    let h = Arc::new(harness_with_latency(ReconcilerConfig::default(), latency).await?);
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.seat("u2", "blue", true, VoiceFlags::OPEN).await;
    h.seat("u3", "lime", true, VoiceFlags::OPEN).await;

    // WHEN: Eight passes race each other
    let passes: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.reconciler().reconcile(0, PriorityMode::None).await })
        })
        .collect();
    for joined in futures::future::join_all(passes).await {
        assert!(matches!(joined, Ok(Ok(_))));
    }

    // THEN: Each member saw exactly one request
    let mut started = h.recorder.started().await;
    started.sort();
    assert_eq!(
        started,
        vec![UserId::from("u1"), UserId::from("u2"), UserId::from("u3")]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn given_slow_rename_in_flight_when_second_pass_runs_then_no_second_request() -> Result<()> {
    // GIVEN: A lobby player whose only drift is the nickname, renamed slowly
    let config = ReconcilerConfig {
        apply_nicknames: true,
        ..ReconcilerConfig::default()
    };
    let latency = HashMap::from([(UserId::from("u1"), Duration::from_millis(100))]);
    let h = Arc::new(harness_with_latency(config, latency).await?);
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;

    // WHEN: A second pass runs while the rename is still in flight
    let first = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.reconciler().reconcile(0, PriorityMode::None).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = h.reconciler().reconcile(0, PriorityMode::None).await?;

    // THEN: Matching flags alone do not release the member; one request total
    assert!(!second, "Second pass must not re-propose the rename");
    assert!(matches!(first.await, Ok(Ok(true))));
    assert_eq!(h.recorder.started().await, vec![UserId::from("u1")]);
    assert_eq!(h.remote.nickname(&UserId::from("u1")).await.as_deref(), Some("red-player"));

    // AND WHEN: The next pass sees the rename landed
    let third = h.reconciler().reconcile_with_report(0, PriorityMode::None).await?;

    // THEN: The member is released without another request
    assert_eq!(third.confirmed, 1);
    assert!(!third.changed());
    assert!(!h.pending("u1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn given_bounded_concurrency_when_cohort_drains_then_one_update_in_flight_at_a_time()
-> Result<()> {
    // GIVEN: Three players needing a mute, and at most one update in flight
    let config = ReconcilerConfig {
        max_concurrent_updates: 1,
        ..ReconcilerConfig::default()
    };
    let latency = ["u1", "u2", "u3"]
        .into_iter()
        .map(|user| (UserId::from(user), Duration::from_millis(20)))
        .collect();
    let h = harness_with_latency(config, latency).await?;
    h.reconciler().game().set_phase(Phase::Tasks).await;
    h.seat("u1", "red", true, VoiceFlags::OPEN).await;
    h.seat("u2", "blue", true, VoiceFlags::OPEN).await;
    h.seat("u3", "lime", true, VoiceFlags::OPEN).await;
    let started = Instant::now();

    // WHEN: Reconciling
    let report = h
        .reconciler()
        .reconcile_with_report(0, PriorityMode::None)
        .await?;

    // THEN: Every update finished before the next one started
    assert_eq!(report.drain.applied.len(), 3);
    let calls = h.recorder.calls().await;
    assert_eq!(calls.len(), 6);
    assert!(
        calls.chunks(2).all(|pair| matches!(
            pair,
            [Call::Started { user_id: a, .. }, Call::Finished { user_id: b, .. }] if a == b
        )),
        "Updates overlapped: {calls:?}"
    );
    assert!(started.elapsed() >= Duration::from_millis(60));
    Ok(())
}
