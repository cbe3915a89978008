use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::model::{KnowledgeFragment, Plan, Subscription, Tenant, UsageEvent};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// CRUD access to tenant state plus the usage aggregation call.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn tenant_by_bot_token(&self, bot_token: &str) -> Result<Option<Tenant>>;

    /// The tenant's active subscription joined with its plan, if any.
    async fn active_subscription(&self, tenant_id: &str) -> Result<Option<(Subscription, Plan)>>;

    /// All fragments for a tenant, in insertion order.
    async fn knowledge_fragments(&self, tenant_id: &str) -> Result<Vec<KnowledgeFragment>>;

    async fn insert_usage_event(&self, event: &UsageEvent) -> Result<()>;

    /// Sum of `tokens` over `[start, end]` inclusive for one subscription.
    async fn sum_usage(
        &self,
        subscription_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64>;

    // Provisioning writes — used by `parley db` and tests, never by the
    // message pipeline.
    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn insert_plan(&self, plan: &Plan) -> Result<()>;
    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()>;
    async fn insert_knowledge_fragment(&self, fragment: &KnowledgeFragment) -> Result<()>;
}
