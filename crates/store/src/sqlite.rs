//! SQLite implementation of the [`TenantStore`] trait.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
};

use crate::{
    model::{KnowledgeFragment, Plan, Subscription, Tenant, UsageEvent},
    store::{Result, TenantStore},
};

pub struct SqliteTenantStore {
    pool: SqlitePool,
}

impl SqliteTenantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the schema. Idempotent; called once at startup.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS tenants (
                id            TEXT PRIMARY KEY,
                bot_token     TEXT NOT NULL UNIQUE,
                name          TEXT NOT NULL,
                contact_email TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plans (
                id          TEXT    PRIMARY KEY,
                name        TEXT    NOT NULL,
                token_limit INTEGER NOT NULL,
                price_cents INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS subscriptions (
                id         TEXT    PRIMARY KEY,
                tenant_id  TEXT    NOT NULL REFERENCES tenants(id),
                plan_id    TEXT    NOT NULL REFERENCES plans(id),
                start_date INTEGER NOT NULL,
                end_date   INTEGER NOT NULL,
                is_active  INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS knowledge_fragments (
                id        TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                content   TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS usage_events (
                id              TEXT    PRIMARY KEY,
                subscription_id TEXT    NOT NULL REFERENCES subscriptions(id),
                tokens          INTEGER NOT NULL,
                timestamp       INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_tenant_active
             ON subscriptions(tenant_id, is_active)",
        )
        .execute(pool)
        .await
        .ok();

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_events_subscription_time
             ON usage_events(subscription_id, timestamp)",
        )
        .execute(pool)
        .await
        .ok();

        Ok(())
    }
}

/// Epoch seconds for storage; sub-second precision is not needed here.
fn to_epoch(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[async_trait]
impl TenantStore for SqliteTenantStore {
    async fn tenant_by_bot_token(&self, bot_token: &str) -> Result<Option<Tenant>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, bot_token, name, contact_email FROM tenants WHERE bot_token = ?",
        )
        .bind(bot_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, bot_token, name, contact_email)| Tenant {
            id,
            bot_token,
            name,
            contact_email,
        }))
    }

    async fn active_subscription(&self, tenant_id: &str) -> Result<Option<(Subscription, Plan)>> {
        type Row = (String, String, String, i64, i64, String, String, i64, i64);
        let row: Option<Row> = sqlx::query_as(
            "SELECT s.id, s.tenant_id, s.plan_id, s.start_date, s.end_date,
                    p.id, p.name, p.token_limit, p.price_cents
             FROM subscriptions s
             JOIN plans p ON p.id = s.plan_id
             WHERE s.tenant_id = ? AND s.is_active = 1
             LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(
            |(id, tenant_id, plan_id, start, end, plan_id2, name, token_limit, price_cents)| {
                (
                    Subscription {
                        id,
                        tenant_id,
                        plan_id,
                        start_date: from_epoch(start),
                        end_date: from_epoch(end),
                        is_active: true,
                    },
                    Plan {
                        id: plan_id2,
                        name,
                        token_limit,
                        price_cents,
                    },
                )
            },
        ))
    }

    async fn knowledge_fragments(&self, tenant_id: &str) -> Result<Vec<KnowledgeFragment>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, tenant_id, content FROM knowledge_fragments
             WHERE tenant_id = ? ORDER BY rowid",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, tenant_id, content)| KnowledgeFragment {
                id,
                tenant_id,
                content,
            })
            .collect())
    }

    async fn insert_usage_event(&self, event: &UsageEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events (id, subscription_id, tokens, timestamp)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.subscription_id)
        .bind(event.tokens)
        .bind(to_epoch(event.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn sum_usage(
        &self,
        subscription_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(tokens), 0) FROM usage_events
             WHERE subscription_id = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(subscription_id)
        .bind(to_epoch(start))
        .bind(to_epoch(end))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenants (id, bot_token, name, contact_email) VALUES (?, ?, ?, ?)",
        )
        .bind(&tenant.id)
        .bind(&tenant.bot_token)
        .bind(&tenant.name)
        .bind(&tenant.contact_email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_plan(&self, plan: &Plan) -> Result<()> {
        sqlx::query("INSERT INTO plans (id, name, token_limit, price_cents) VALUES (?, ?, ?, ?)")
            .bind(&plan.id)
            .bind(&plan.name)
            .bind(plan.token_limit)
            .bind(plan.price_cents)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, tenant_id, plan_id, start_date, end_date, is_active)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&subscription.id)
        .bind(&subscription.tenant_id)
        .bind(&subscription.plan_id)
        .bind(to_epoch(subscription.start_date))
        .bind(to_epoch(subscription.end_date))
        .bind(subscription.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_knowledge_fragment(&self, fragment: &KnowledgeFragment) -> Result<()> {
        sqlx::query("INSERT INTO knowledge_fragments (id, tenant_id, content) VALUES (?, ?, ?)")
            .bind(&fragment.id)
            .bind(&fragment.tenant_id)
            .bind(&fragment.content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
