//! Tenant directory: bot token → tenant, tenant → active subscription + plan.
//!
//! Fail-closed: a store error is logged and collapsed to `None`, so callers
//! cannot tell absence from a backing failure. Tenant identity gates where
//! replies are delivered; a flaky store must degrade to "unknown", never to
//! a guess.

use std::sync::Arc;

use tracing::{debug, warn};

use parley_store::{Plan, Subscription, Tenant, TenantStore};

pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// Resolve the tenant owning `bot_token`, or `None`.
    pub async fn resolve_tenant(&self, bot_token: &str) -> Option<Tenant> {
        match self.store.tenant_by_bot_token(bot_token).await {
            Ok(Some(tenant)) => {
                debug!(tenant_id = %tenant.id, "resolved tenant");
                Some(tenant)
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "tenant lookup failed, treating as not found");
                None
            },
        }
    }

    /// Resolve the tenant's active subscription and its plan, or `None`.
    pub async fn resolve_active_subscription(
        &self,
        tenant_id: &str,
    ) -> Option<(Subscription, Plan)> {
        match self.store.active_subscription(tenant_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    tenant_id,
                    error = %e,
                    "subscription lookup failed, treating as not found"
                );
                None
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        chrono::{TimeZone, Utc},
        parley_store::SqliteTenantStore,
        sqlx::SqlitePool,
    };

    use super::*;

    async fn seeded() -> (TenantDirectory, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteTenantStore::init(&pool).await.unwrap();
        let store = SqliteTenantStore::new(pool.clone());

        store
            .insert_tenant(&Tenant {
                id: "t1".into(),
                bot_token: "111:AAA".into(),
                name: "Acme".into(),
                contact_email: "support@acme.test".into(),
            })
            .await
            .unwrap();
        store
            .insert_plan(&Plan {
                id: "p1".into(),
                name: "Starter".into(),
                token_limit: 1000,
                price_cents: 900,
            })
            .await
            .unwrap();
        store
            .insert_subscription(&Subscription {
                id: "s1".into(),
                tenant_id: "t1".into(),
                plan_id: "p1".into(),
                start_date: Utc.timestamp_opt(0, 0).unwrap(),
                end_date: Utc.timestamp_opt(10_000, 0).unwrap(),
                is_active: true,
            })
            .await
            .unwrap();

        (TenantDirectory::new(Arc::new(store)), pool)
    }

    #[tokio::test]
    async fn resolves_known_token() {
        let (directory, _pool) = seeded().await;
        let tenant = directory.resolve_tenant("111:AAA").await.unwrap();
        assert_eq!(tenant.id, "t1");
    }

    #[tokio::test]
    async fn unknown_token_is_none() {
        let (directory, _pool) = seeded().await;
        assert!(directory.resolve_tenant("999:ZZZ").await.is_none());
    }

    #[tokio::test]
    async fn resolves_subscription_with_plan() {
        let (directory, _pool) = seeded().await;
        let (sub, plan) = directory.resolve_active_subscription("t1").await.unwrap();
        assert_eq!(sub.id, "s1");
        assert_eq!(plan.name, "Starter");
    }

    #[tokio::test]
    async fn store_failure_degrades_to_not_found() {
        let (directory, pool) = seeded().await;
        pool.close().await;
        assert!(directory.resolve_tenant("111:AAA").await.is_none());
        assert!(directory.resolve_active_subscription("t1").await.is_none());
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let (directory, _pool) = seeded().await;
        let a = directory.resolve_tenant("111:AAA").await;
        let b = directory.resolve_tenant("111:AAA").await;
        assert_eq!(a, b);
    }
}
