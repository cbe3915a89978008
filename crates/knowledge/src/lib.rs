//! Knowledge retriever: a tenant's fragments concatenated into one context
//! string.
//!
//! Fail-open: a fetch failure or an empty knowledge base yields `""`, and
//! the pipeline answers with reduced grounding instead of aborting. This is
//! the deliberate opposite of the directory's fail-closed policy.

use std::sync::Arc;

use tracing::{debug, warn};

use parley_store::TenantStore;

pub struct KnowledgeRetriever {
    store: Arc<dyn TenantStore>,
}

impl KnowledgeRetriever {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// All fragment contents for the tenant, joined with a single space.
    /// Fragments with empty content are skipped.
    pub async fn context_for(&self, tenant_id: &str) -> String {
        let fragments = match self.store.knowledge_fragments(tenant_id).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(tenant_id, error = %e, "knowledge fetch failed, using empty context");
                return String::new();
            },
        };

        let context = fragments
            .iter()
            .map(|f| f.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        debug!(
            tenant_id,
            fragment_count = fragments.len(),
            context_len = context.len(),
            "assembled knowledge context"
        );
        context
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        parley_store::{KnowledgeFragment, SqliteTenantStore, Tenant},
        sqlx::SqlitePool,
    };

    use super::*;

    async fn retriever_with(fragments: &[&str]) -> (KnowledgeRetriever, SqlitePool) {
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
        for (i, content) in fragments.iter().enumerate() {
            store
                .insert_knowledge_fragment(&KnowledgeFragment {
                    id: format!("k{i}"),
                    tenant_id: "t1".into(),
                    content: (*content).into(),
                })
                .await
                .unwrap();
        }
        (KnowledgeRetriever::new(Arc::new(store)), pool)
    }

    #[tokio::test]
    async fn joins_fragments_with_single_space() {
        let (retriever, _pool) =
            retriever_with(&["Opening hours: 9-17.", "Refunds within 30 days."]).await;
        assert_eq!(
            retriever.context_for("t1").await,
            "Opening hours: 9-17. Refunds within 30 days."
        );
    }

    #[tokio::test]
    async fn skips_empty_fragments() {
        let (retriever, _pool) = retriever_with(&["a", "", "   ", "b"]).await;
        assert_eq!(retriever.context_for("t1").await, "a b");
    }

    #[tokio::test]
    async fn empty_knowledge_base_is_empty_string() {
        let (retriever, _pool) = retriever_with(&[]).await;
        assert_eq!(retriever.context_for("t1").await, "");
    }

    #[tokio::test]
    async fn store_failure_is_empty_string() {
        let (retriever, pool) = retriever_with(&["something"]).await;
        pool.close().await;
        assert_eq!(retriever.context_for("t1").await, "");
    }
}
