//! Background maintenance for an open query log
//!
//! Handles:
//! - Rotation of the active segment on the configured interval
//! - Flushes requested by `add` once the memory buffer reaches capacity
//!
//! Failures are logged and retried later: a failed requested flush pauses
//! further requests for the configured retry delay, then tries once more on
//! its own. The task itself only stops on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::querylog::Inner;

/// Background maintenance task
pub(crate) struct MaintenanceTask {
    inner: Arc<Inner>,
    rotation_interval: Duration,
    retry_delay: Duration,
    shutdown_rx: broadcast::Receiver<()>,
    rotations: u64,
}

impl MaintenanceTask {
    /// Spawn the maintenance task as a background task
    pub(crate) fn spawn(
        inner: Arc<Inner>,
        rotation_interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let retry_delay = inner.config().flush_retry_delay;
        let task = Self {
            inner,
            rotation_interval,
            retry_delay,
            shutdown_rx,
            rotations: 0,
        };

        tokio::spawn(async move {
            task.run().await;
        })
    }

    async fn run(mut self) {
        info!(
            interval_secs = self.rotation_interval.as_secs(),
            "Query log maintenance task started"
        );

        // First rotation one full interval after open
        let mut rotation =
            tokio::time::interval_at(Instant::now() + self.rotation_interval, self.rotation_interval);
        rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Set while requested flushes are paused after a failure
        let mut retry_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!(rotations = self.rotations, "Query log maintenance task shutting down");
                    break;
                }
                _ = self.inner.flush_requested(), if retry_at.is_none() => {
                    retry_at = self.requested_flush().await;
                }
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = self.requested_flush().await;
                }
                _ = rotation.tick() => {
                    match self.inner.rotate().await {
                        Ok(()) => self.rotations += 1,
                        Err(e) => error!(error = %e, "Scheduled rotation failed, will retry next interval"),
                    }
                }
            }
        }
    }

    /// Flush if the buffer still wants it; on failure, when to try again
    async fn requested_flush(&self) -> Option<Instant> {
        match self.inner.flush(false).await {
            Ok(written) => {
                debug!(written, "Served flush request");
                None
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_in_ms = self.retry_delay.as_millis() as u64,
                    "Requested flush failed"
                );
                Some(Instant::now() + self.retry_delay)
            }
        }
    }
}
