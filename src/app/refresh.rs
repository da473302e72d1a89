//! Daily background refresh
//!
//! Runs one refresh cycle at a fixed UTC hour each day. A single in-flight
//! guard coalesces overlapping triggers: if a cycle is still running when
//! the next trigger arrives (timer tick or manual), the trigger is a no-op.
//! A failing cycle is retried a bounded number of times with a fixed delay;
//! after exhaustion the scheduler gives up until the next scheduled run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::constants::refresh;
use crate::errors::{AppError, Result};

/// One unit of refresh work, run under the scheduler's guard
#[async_trait]
pub trait RefreshCycle: Send + Sync {
    /// Run one full refresh cycle
    async fn run_cycle(&self) -> Result<()>;
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// UTC hour of the daily run (0-23)
    pub hour: u32,
    /// Attempts per scheduled run
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            hour: refresh::DAILY_REBUILD_HOUR,
            max_retries: refresh::CYCLE_MAX_RETRIES,
            retry_delay: refresh::CYCLE_RETRY_DELAY,
        }
    }
}

/// Daily scheduler around a [`RefreshCycle`]
pub struct RefreshScheduler {
    cycle: Arc<dyn RefreshCycle>,
    config: RefreshConfig,
    in_flight: AtomicBool,
}

impl RefreshScheduler {
    /// Create a scheduler over a cycle implementation
    pub fn new(cycle: Arc<dyn RefreshCycle>, config: RefreshConfig) -> Arc<Self> {
        Arc::new(Self {
            cycle,
            config,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Time remaining until the next scheduled run
    ///
    /// Always in the future: a `now` at or past today's run hour rolls over
    /// to tomorrow.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Duration {
        delay_until_hour(self.config.hour, now)
    }

    /// Spawn the daily loop
    ///
    /// The task sleeps until the next scheduled hour, runs one guarded
    /// cycle, and recomputes the interval regardless of the outcome.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let delay = scheduler.delay_until_next(Utc::now());
                info!(hour = scheduler.config.hour, ?delay, "next refresh scheduled");
                tokio::time::sleep(delay).await;
                scheduler.trigger().await;
            }
        })
    }

    /// Run one cycle now, unless one is already in flight
    ///
    /// Returns `false` when the trigger coalesced into a running cycle.
    pub async fn trigger(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("refresh already in progress, trigger ignored");
            return false;
        }

        let outcome = self.run_with_retries().await;
        self.in_flight.store(false, Ordering::SeqCst);

        if let Err(e) = outcome {
            error!(error = %e, "refresh cycle abandoned until next schedule");
        }
        true
    }

    async fn run_with_retries(&self) -> Result<()> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error: Option<AppError> = None;

        for attempt in 1..=attempts {
            match self.cycle.run_cycle().await {
                Ok(()) => {
                    info!(attempt, "refresh cycle complete");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max = attempts, error = %e, "refresh cycle failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(AppError::Build(crate::errors::BuildError::CycleFailed {
            attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }))
    }
}

/// Duration from `now` until the next daily occurrence of `hour:00:00` UTC
pub fn delay_until_hour(hour: u32, now: DateTime<Utc>) -> Duration {
    let hour = hour.min(23);
    let today = now
        .with_hour(hour)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let target = if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    };
    (target - now).to_std().unwrap_or(Duration::from_secs(60))
}
