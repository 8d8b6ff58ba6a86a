//! Fan-out Worker
//!
//! Periodically claims due outbound events and hands each to a [`Deliverer`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use checkout_core::{backoff, OutboundEvent, SaleStore};

use super::delivery::Deliverer;
use crate::error::Result;

/// Worker settings
#[derive(Clone, Debug)]
pub struct FanoutConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Events claimed per sweep
    pub batch_size: usize,
    /// Failed attempts before an event is left for manual retry
    pub max_attempts: u32,
    /// How long a claim holds before another worker may take the event
    pub lease: ChronoDuration,
    pub worker_id: String,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 50,
            max_attempts: 6,
            lease: ChronoDuration::minutes(5),
            worker_id: format!("fanout-{}", Uuid::new_v4()),
        }
    }
}

impl FanoutConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: std::env::var("FANOUT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map_or(defaults.interval, Duration::from_secs),
            batch_size: std::env::var("FANOUT_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            max_attempts: std::env::var("FANOUT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
            ..defaults
        }
    }
}

/// Counts for one sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct FanoutWorker {
    store: Arc<dyn SaleStore>,
    deliverer: Arc<dyn Deliverer>,
    config: FanoutConfig,
}

impl FanoutWorker {
    pub fn new(store: Arc<dyn SaleStore>, deliverer: Arc<dyn Deliverer>, config: FanoutConfig) -> Self {
        Self {
            store,
            deliverer,
            config,
        }
    }

    /// Claim and deliver every event due at `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let events = self
            .store
            .claim_due(
                &self.config.worker_id,
                now,
                self.config.batch_size,
                self.config.max_attempts,
                self.config.lease,
            )
            .await?;

        let mut report = SweepReport {
            claimed: events.len(),
            ..SweepReport::default()
        };
        for event in events {
            if self.deliver_one(&event, now).await? {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.claimed > 0 {
            tracing::info!(
                claimed = report.claimed,
                sent = report.sent,
                failed = report.failed,
                "Fan-out sweep finished"
            );
        }
        Ok(report)
    }

    async fn deliver_one(&self, event: &OutboundEvent, now: DateTime<Utc>) -> Result<bool> {
        let worker = &self.config.worker_id;
        match self.deliverer.deliver(event).await {
            Ok(()) => {
                self.store.mark_sent(event.id, worker).await?;
                tracing::debug!(
                    event_id = %event.id,
                    kind = event.target.kind(),
                    destination = event.target.destination(),
                    "Outbound event delivered"
                );
                Ok(true)
            }
            Err(e) => {
                let attempts = event.attempts + 1;
                let error = e.to_string();
                self.store
                    .mark_failed(event.id, worker, &error, now + backoff(attempts))
                    .await?;
                if attempts >= self.config.max_attempts {
                    tracing::warn!(
                        event_id = %event.id,
                        sale_id = %event.sale_id,
                        kind = event.target.kind(),
                        attempts,
                        error = %error,
                        "Giving up on outbound event until it is retried manually"
                    );
                } else {
                    tracing::warn!(
                        event_id = %event.id,
                        kind = event.target.kind(),
                        attempts,
                        error = %error,
                        "Outbound delivery failed"
                    );
                }
                Ok(false)
            }
        }
    }

    /// Sweep on an interval until `shutdown` turns true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            worker_id = %self.config.worker_id,
            interval_secs = self.config.interval.as_secs(),
            "Fan-out worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        tracing::error!(error = %e, "Fan-out sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(worker_id = %self.config.worker_id, "Fan-out worker stopped");
    }
}
