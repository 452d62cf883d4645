//! Background eviction of idle clients.
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::Result;
use crate::limiters::TieredRateLimiter;

// Deadline used when the interval cannot be added to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Owns the periodic sweep task for one limiter.
///
/// Stopped with `shutdown`; if dropped while still running the task is
/// aborted instead.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweep loop. Must be called from within a tokio runtime.
    pub fn start(
        rate_limiter: Arc<TieredRateLimiter>,
        sweep_interval: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Self::run(
            rate_limiter,
            sweep_interval,
            idle_timeout,
            shutdown_rx,
        ));
        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    async fn run(
        rate_limiter: Arc<TieredRateLimiter>,
        sweep_interval: Duration,
        idle_timeout: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(
            "Starting idle-client sweeper: every {}s, idle timeout {}s",
            sweep_interval.as_secs_f64(),
            idle_timeout.as_secs_f64()
        );
        let idle_timeout_ms = i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX);
        // first sweep one full interval after start
        let start = Instant::now();
        let first_sweep = start
            .checked_add(sweep_interval)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut sweep_timer = time::interval_at(first_sweep, sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_round = 0u64;

        loop {
            tokio::select! {
                _ = sweep_timer.tick() => {
                    sweep_round += 1;
                    let removed = rate_limiter
                        .expire_idle_clients(idle_timeout_ms, Utc::now().timestamp_millis());
                    debug!("Sweep round {} evicted {} clients", sweep_round, removed);
                }
                // Explicit shutdown or the sender was dropped
                _ = shutdown_rx.recv() => {
                    info!("Sweeper stopping after {} rounds", sweep_round);
                    break;
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            // A full or closed channel means the loop is already exiting
            let _ = shutdown_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
