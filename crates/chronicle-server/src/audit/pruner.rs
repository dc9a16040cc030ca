//! Age-based retention of audit entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use chronicle_common::ChronicleError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::config::MAX_KEEP_FOR_DAYS;
use super::error::AuditResult;
use super::store::AuditStore;

/// Entries created at or before this instant are expired.
///
/// `keep_days` must lie in `0..=MAX_KEEP_FOR_DAYS`.
pub fn cutoff(now: DateTime<Utc>, keep_days: i64) -> AuditResult<DateTime<Utc>> {
    let out_of_range = || {
        ChronicleError::config(format!(
            "keep_for_days must be between 0 and {MAX_KEEP_FOR_DAYS}, got {keep_days}"
        ))
    };

    if !(0..=MAX_KEEP_FOR_DAYS).contains(&keep_days) {
        return Err(out_of_range().into());
    }

    let window = TimeDelta::try_days(keep_days).ok_or_else(out_of_range)?;
    now.checked_sub_signed(window)
        .ok_or_else(|| out_of_range().into())
}

/// Delete every entry with `created_at <= now - keep_days`.
pub async fn prune(store: &dyn AuditStore, now: DateTime<Utc>, keep_days: i64) -> AuditResult<u64> {
    let cutoff = cutoff(now, keep_days)?;
    let removed = store.delete_older_than(cutoff).await?;
    info!(removed, keep_days, cutoff = %cutoff, "Pruned expired audit entries");
    Ok(removed)
}

/// Runs `prune` on a fixed interval until cancelled.
pub struct RetentionScheduler {
    store: Arc<dyn AuditStore>,
    keep_days: i64,
    interval: Duration,
}

impl RetentionScheduler {
    pub fn new(store: Arc<dyn AuditStore>, keep_days: i64, interval: Duration) -> Self {
        Self {
            store,
            keep_days,
            interval,
        }
    }

    /// Spawn the sweep loop. The first sweep runs immediately.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(
                keep_days = self.keep_days,
                interval_secs = self.interval.as_secs(),
                "Retention scheduler started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = prune(self.store.as_ref(), Utc::now(), self.keep_days).await {
                            error!(error = %e, "Scheduled audit pruning failed");
                        }
                    }
                }
            }

            info!("Retention scheduler stopped");
        })
    }
}
