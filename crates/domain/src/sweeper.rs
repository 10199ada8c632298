//! Expiry of abandoned cart reservations.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use store::Cart;

use crate::error::DomainError;

/// Returns stock held by cart lines that have not been touched for longer
/// than the reservation TTL.
pub struct ReservationSweeper<S> {
    store: S,
    ttl: chrono::Duration,
}

impl<S: Cart> ReservationSweeper<S> {
    /// Creates a sweeper. Returns `None` when `ttl` is zero, which keeps
    /// reservations forever.
    pub fn new(store: S, ttl: Duration) -> Option<Self> {
        if ttl.is_zero() {
            return None;
        }
        let ttl =
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Some(Self { store, ttl })
    }

    /// Releases every expired line once. Returns how many lines expired.
    pub async fn sweep_once(&self) -> Result<usize, DomainError> {
        let cutoff = Utc::now() - self.ttl;
        let expired = self.store.release_expired(cutoff).await?;

        if !expired.is_empty() {
            let units: u64 = expired.iter().map(|l| u64::from(l.quantity)).sum();
            metrics::counter!("reservations_expired_total").increment(expired.len() as u64);
            metrics::counter!("inventory_released_units_total").increment(units);
            tracing::info!(lines = expired.len(), units, "released expired reservations");
        }
        Ok(expired.len())
    }

    /// Sweeps every `interval` (at least one second) until `shutdown` resolves.
    pub async fn run(self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("reservation sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "reservation sweep failed");
                    }
                }
            }
        }
    }
}
