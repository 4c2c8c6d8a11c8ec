//! Periodic reconciliation.
//!
//! Catches drift no event reported, such as a member whose failed update left
//! them out of sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::types::PriorityMode;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between reconciliation passes.
    pub interval: Duration,
    /// Maximum consecutive errors before stopping.
    pub max_errors: usize,
    /// Whether to stop on first error.
    pub stop_on_error: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_errors: 10,
            stop_on_error: false,
        }
    }
}

/// Runs undelayed, unprioritised passes on a timer until stopped.
pub struct ReconciliationLoop {
    reconciler: Arc<Reconciler>,
    config: LoopConfig,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl ReconciliationLoop {
    /// Create a new reconciliation loop.
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, config: LoopConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            config,
            stop_rx,
            stop_tx,
        }
    }

    /// Run until stopped or until too many passes fail in a row.
    ///
    /// # Errors
    ///
    /// Returns the failing pass's error when `stop_on_error` is set, or
    /// [`Error::LoopAborted`] once `max_errors` consecutive passes failed.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            guild_id = %self.reconciler.guild_id(),
            interval_ms = self.config.interval.as_millis(),
            "Starting reconciliation loop"
        );

        let mut consecutive_errors = 0_usize;
        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reconciler.reconcile(0, PriorityMode::None).await {
                        Ok(changed) => {
                            consecutive_errors = 0;
                            if !changed {
                                debug!("Voice state converged");
                            }
                        }
                        Err(e) => {
                            consecutive_errors = consecutive_errors.saturating_add(1);
                            error!(
                                error = %e,
                                consecutive = consecutive_errors,
                                "Reconciliation error"
                            );

                            if self.config.stop_on_error {
                                return Err(e);
                            }

                            if consecutive_errors >= self.config.max_errors {
                                error!("Max errors reached, stopping loop");
                                return Err(Error::loop_aborted(format!(
                                    "{} consecutive failed passes",
                                    self.config.max_errors
                                )));
                            }
                        }
                    }
                }
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        info!("Reconciliation loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Get a stopper handle.
    #[must_use]
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Handle to stop a reconciliation loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
