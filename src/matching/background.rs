//! Background processing scheduler.
//!
//! One run shortly after startup, then one every interval. Each run is the
//! same guarded cycle the on-demand endpoint triggers; a tick that finds a
//! cycle already in flight is skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core_state::{CoreError, CoreState};

/// Handle for the background scheduler task.
///
/// Dropping the handle signals shutdown. A cycle already running finishes,
/// no new one starts.
pub struct ProcessingSchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessingSchedulerHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait for the task to exit.
    pub async fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Processing scheduler task failed");
            }
        }
    }
}

impl Drop for ProcessingSchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the scheduler on the current tokio runtime.
pub fn start_processing_scheduler(
    core: Arc<CoreState>,
    startup_delay: Duration,
    interval: Duration,
) -> ProcessingSchedulerHandle {
    let (shutdown, mut rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        tracing::info!(?startup_delay, ?interval, "Processing scheduler started");

        tokio::select! {
            _ = tokio::time::sleep(startup_delay) => run_once(&core, "startup").await,
            _ = rx.changed() => {
                tracing::info!("Processing scheduler stopped");
                return;
            }
        }

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(&core, "interval").await,
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Processing scheduler stopped");
    });

    ProcessingSchedulerHandle {
        shutdown,
        handle: Some(handle),
    }
}

async fn run_once(core: &Arc<CoreState>, trigger: &'static str) {
    let core = Arc::clone(core);
    let result = tokio::task::spawn_blocking(move || core.run_processing_cycle(Utc::now())).await;

    match result {
        Ok(Ok(report)) => tracing::info!(
            trigger,
            created = report.sync.created.len(),
            approved = report.batch.approved_count(),
            rejected = report.batch.rejected_count(),
            aborted = report.batch.aborted.is_some(),
            "Scheduled processing complete"
        ),
        Ok(Err(CoreError::RunInProgress)) => {
            tracing::debug!(trigger, "Processing already running, tick skipped")
        }
        Ok(Err(e)) => tracing::error!(trigger, error = %e, "Scheduled processing failed"),
        Err(e) => tracing::error!(trigger, error = %e, "Scheduled processing panicked"),
    }
}
