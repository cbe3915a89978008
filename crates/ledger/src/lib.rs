//! Usage ledger: token-consumption events and billing-window aggregates.
//!
//! Reads fail open to zero so a transient store outage does not block a
//! paying tenant. Writes are fire-once: a failed insert is logged and the
//! reply is not held back, so accounting can lag under persistent store
//! failures — an accepted, documented gap.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::{debug, warn},
    uuid::Uuid,
};

use parley_store::{TenantStore, UsageEvent};

pub struct UsageLedger {
    store: Arc<dyn TenantStore>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// Total tokens recorded for the subscription in `[start, end]`
    /// inclusive. Returns 0 on any backing failure.
    pub async fn total_usage(
        &self,
        subscription_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> i64 {
        match self.store.sum_usage(subscription_id, start, end).await {
            Ok(total) => total.max(0),
            Err(e) => {
                warn!(subscription_id, error = %e, "usage read failed, assuming zero");
                0
            },
        }
    }

    /// Append one usage event. Returns `false` on failure; the write is not
    /// retried.
    pub async fn record_usage(&self, subscription_id: &str, tokens: i64) -> bool {
        let event = UsageEvent {
            id: Uuid::new_v4().to_string(),
            subscription_id: subscription_id.to_string(),
            tokens: tokens.max(0),
            timestamp: Utc::now(),
        };
        match self.store.insert_usage_event(&event).await {
            Ok(()) => {
                debug!(subscription_id, tokens = event.tokens, "usage recorded");
                true
            },
            Err(e) => {
                warn!(subscription_id, tokens, error = %e, "usage write failed");
                false
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        chrono::{Duration, TimeZone},
        parley_store::SqliteTenantStore,
        sqlx::SqlitePool,
    };

    use super::*;

    async fn ledger() -> (UsageLedger, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteTenantStore::init(&pool).await.unwrap();
        let store = SqliteTenantStore::new(pool.clone());
        (UsageLedger::new(Arc::new(store)), pool)
    }

    fn wide_window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::hours(1), now + Duration::hours(1))
    }

    #[tokio::test]
    async fn totals_are_additive_regardless_of_order() {
        let (ledger, _pool) = ledger().await;
        let (start, end) = wide_window();

        for tokens in [40, 7, 953] {
            assert!(ledger.record_usage("s1", tokens).await);
        }
        assert_eq!(ledger.total_usage("s1", start, end).await, 1000);

        // A different interleaving lands on the same total.
        for tokens in [953, 40, 7] {
            assert!(ledger.record_usage("s2", tokens).await);
        }
        assert_eq!(ledger.total_usage("s2", start, end).await, 1000);
    }

    #[tokio::test]
    async fn empty_ledger_totals_zero() {
        let (ledger, _pool) = ledger().await;
        let (start, end) = wide_window();
        assert_eq!(ledger.total_usage("s1", start, end).await, 0);
    }

    #[tokio::test]
    async fn events_outside_the_window_are_excluded() {
        let (ledger, _pool) = ledger().await;
        assert!(ledger.record_usage("s1", 25).await);

        let past_start = Utc.timestamp_opt(0, 0).unwrap();
        let past_end = Utc.timestamp_opt(1000, 0).unwrap();
        assert_eq!(ledger.total_usage("s1", past_start, past_end).await, 0);
    }

    #[tokio::test]
    async fn read_failure_degrades_to_zero() {
        let (ledger, pool) = ledger().await;
        assert!(ledger.record_usage("s1", 10).await);
        let (start, end) = wide_window();
        pool.close().await;
        assert_eq!(ledger.total_usage("s1", start, end).await, 0);
    }

    #[tokio::test]
    async fn write_failure_returns_false() {
        let (ledger, pool) = ledger().await;
        pool.close().await;
        assert!(!ledger.record_usage("s1", 10).await);
    }

    #[tokio::test]
    async fn negative_token_counts_are_clamped() {
        let (ledger, _pool) = ledger().await;
        assert!(ledger.record_usage("s1", -5).await);
        let (start, end) = wide_window();
        assert_eq!(ledger.total_usage("s1", start, end).await, 0);
    }
}
