use chrono::{DateTime, Utc};

/// A customer company. Provisioned out-of-band; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: String,
    /// Telegram bot token; unique, and the key routing inbound webhooks.
    pub bot_token: String,
    pub name: String,
    pub contact_email: String,
}

/// A billing plan. Defines the token ceiling for subscriptions that reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub token_limit: i64,
    pub price_cents: i64,
}

/// A tenant's enrollment in a plan over a billing window.
///
/// Provisioning keeps at most one `is_active` row per tenant; the pipeline
/// trusts whichever active row it finds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub tenant_id: String,
    pub plan_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

/// One piece of a tenant's knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeFragment {
    pub id: String,
    pub tenant_id: String,
    pub content: String,
}

/// One recorded unit of token consumption. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub id: String,
    pub subscription_id: String,
    pub tokens: i64,
    pub timestamp: DateTime<Utc>,
}
