use chrono::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use cinegate_core::repository::BookingRepository;
use cinegate_core::{Clock, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub sweep_interval: std::time::Duration,
    pub batch_size: i64,
    /// Extra time past `expires_at` before a hold is reclaimed; absorbs
    /// clock skew between replicas.
    pub grace: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            sweep_interval: std::time::Duration::from_secs(30),
            batch_size: 100,
            grace: Duration::seconds(5),
        }
    }
}

/// Background task that cancels Pending bookings whose hold ran out and
/// returns their seats to the pool.
pub struct ExpirySweeper {
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
}

impl ExpirySweeper {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
        policy: ExpiryPolicy,
    ) -> Self {
        Self { bookings, clock, policy }
    }

    /// Drain every booking expired as of now, one batch per transaction
    pub async fn sweep_once(&self) -> CoreResult<Vec<Uuid>> {
        let cutoff = self.clock.now() - self.policy.grace;
        let limit = self.policy.batch_size.max(1);
        let mut expired = Vec::new();

        loop {
            let batch = self.bookings.expire_pending(cutoff, limit).await?;
            let done = (batch.len() as i64) < limit;
            expired.extend(batch);
            if done {
                break;
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired pending bookings released");
        }
        Ok(expired)
    }

    /// Sweep on a fixed interval until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.policy.sweep_interval);
        info!(interval = ?self.policy.sweep_interval, "Expiry sweeper started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(ids) => {
                            for id in ids {
                                debug!(booking_id = %id, "Booking expired");
                            }
                        }
                        Err(e) => error!("Expiry sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Expiry sweeper stopping");
                        break;
                    }
                }
            }
        }
    }
}
