//! Priority-ordered dispatch of member updates.
//!
//! Changes are grouped into cohorts of equal priority and drained from the
//! highest priority down. Every change of a cohort is issued concurrently on
//! its own task, and the next cohort starts only after the whole previous one
//! has finished, successfully or not.

use std::cmp::Reverse;
use std::sync::Arc;

use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use voxsync_core::UserId;

use crate::remote::MemberUpdater;
use crate::types::{MemberPatch, PendingChange};

/// Changes sharing one priority tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cohort {
    pub priority: i32,
    pub changes: Vec<PendingChange>,
}

/// Outcome of draining a queue.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Patches the remote side acknowledged.
    pub applied: Vec<MemberPatch>,
    /// Members whose update failed, with the reason.
    pub failed: Vec<(UserId, String)>,
    /// Workers that died before reporting.
    pub aborted: usize,
}

impl DrainReport {
    /// Whether every issued update was acknowledged.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.aborted == 0
    }

    /// Number of updates issued.
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied
            .len()
            .saturating_add(self.failed.len())
            .saturating_add(self.aborted)
    }
}

/// Batch of proposed changes for one reconciliation pass.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    changes: Vec<PendingChange>,
}

impl DispatchQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a change.
    pub fn push(&mut self, change: PendingChange) {
        self.changes.push(change);
    }

    /// Number of queued changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Split into cohorts, highest priority first.
    ///
    /// Insertion order is kept inside a cohort.
    #[must_use]
    pub fn into_cohorts(self) -> Vec<Cohort> {
        let mut changes = self.changes;
        changes.sort_by_key(|change| Reverse(change.priority));
        changes
            .into_iter()
            .chunk_by(|change| change.priority)
            .into_iter()
            .map(|(priority, group)| Cohort {
                priority,
                changes: group.collect(),
            })
            .collect()
    }

    /// Issue every change, one cohort at a time.
    ///
    /// `max_in_flight` bounds concurrent updates inside a cohort; 0 means
    /// unbounded. Failures are logged and reported, never propagated, and
    /// never stop the remaining updates.
    pub async fn drain(self, updater: Arc<dyn MemberUpdater>, max_in_flight: usize) -> DrainReport {
        let limiter = (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight)));
        let mut report = DrainReport::default();
        let cohorts = self.into_cohorts();
        let mut waiting_for_higher_priority = false;

        for cohort in cohorts {
            if cohort.priority > 0 {
                for change in &cohort.changes {
                    info!(
                        user_id = %change.user_id(),
                        priority = change.priority,
                        "User has higher priority"
                    );
                }
                waiting_for_higher_priority = true;
            } else if waiting_for_higher_priority {
                debug!("Waited for high priority user changes first");
            }

            let workers = cohort
                .changes
                .into_iter()
                .map(|change| {
                    let updater = Arc::clone(&updater);
                    let limiter = limiter.clone();
                    tokio::spawn(async move {
                        let _permit = match limiter {
                            Some(limiter) => limiter.acquire_owned().await.ok(),
                            None => None,
                        };
                        let outcome = updater.update_member(&change.patch).await;
                        (change.patch, outcome)
                    })
                })
                .collect_vec();

            // Barrier: the whole cohort settles before the next tier starts.
            for joined in join_all(workers).await {
                match joined {
                    Ok((patch, Ok(()))) => {
                        debug!(user_id = %patch.user_id, mute = patch.mute, deaf = patch.deaf, "Member updated");
                        report.applied.push(patch);
                    }
                    Ok((patch, Err(e))) => {
                        warn!(user_id = %patch.user_id, error = %e, "Member update failed");
                        report.failed.push((patch.user_id, e.to_string()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Update worker aborted");
                        report.aborted = report.aborted.saturating_add(1);
                    }
                }
            }
        }

        report
    }
}
