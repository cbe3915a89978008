use std::{panic::AssertUnwindSafe, sync::Arc};

use {
    futures::FutureExt,
    tracing::{debug, error, info, warn},
};

use {
    parley_common::{
        DeliveryChannel, InboundMessage, ReplyGenerator, text::truncate_at_char_boundary,
    },
    parley_directory::TenantDirectory,
    parley_knowledge::KnowledgeRetriever,
    parley_ledger::UsageLedger,
};

use crate::notices;

/// Inbound text cap. Longer messages are truncated, not rejected.
pub const MAX_INBOUND_LEN: usize = 4096;

/// Terminal result of one inbound message. Exactly one occurs per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty after trimming; silently dropped, nothing sent.
    Ignored,
    /// Unknown bot token. No trusted destination exists, so nothing is sent.
    TenantNotFound,
    /// Tenant has no active subscription; a notice was sent.
    NoSubscription,
    /// The plan budget would be exceeded; a notice was sent, nothing recorded.
    QuotaExceeded,
    /// Reply generated, usage recorded, reply sent.
    Replied,
    /// The core crashed; a generic notice was attempted.
    Failed,
}

/// Sequences one inbound message through resolution, generation, the quota
/// gate, and delivery.
///
/// All collaborators are built once at startup and shared across concurrent
/// invocations; the pipeline holds no per-message state. Failure policy is
/// layered into the collaborators themselves (directory fail-closed,
/// knowledge/ledger fail-open, generation/delivery self-absorbing), so
/// `run` is a straight line with no error plumbing.
pub struct Pipeline {
    directory: TenantDirectory,
    knowledge: KnowledgeRetriever,
    ledger: UsageLedger,
    generator: Arc<dyn ReplyGenerator>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl Pipeline {
    pub fn new(
        directory: TenantDirectory,
        knowledge: KnowledgeRetriever,
        ledger: UsageLedger,
        generator: Arc<dyn ReplyGenerator>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            directory,
            knowledge,
            ledger,
            generator,
            delivery,
        }
    }

    /// Process one message to its terminal outcome.
    ///
    /// The core is isolated behind a panic boundary: if it unwinds, a
    /// generic notice is attempted and the caller sees [`Outcome::Failed`]
    /// instead of a torn-down connection.
    pub async fn handle(&self, msg: InboundMessage) -> Outcome {
        let bot_token = msg.bot_token.clone();
        let chat_id = msg.chat_id;

        match AssertUnwindSafe(self.run(msg)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_panic) => {
                error!(chat_id, "message pipeline crashed");
                if !self
                    .delivery
                    .send(&bot_token, chat_id, notices::TECHNICAL_DIFFICULTIES)
                    .await
                {
                    warn!(chat_id, "failed to deliver technical-difficulties notice");
                }
                Outcome::Failed
            },
        }
    }

    async fn run(&self, msg: InboundMessage) -> Outcome {
        let text = truncate_at_char_boundary(msg.text.trim(), MAX_INBOUND_LEN);
        if text.is_empty() {
            debug!(chat_id = msg.chat_id, "ignoring empty message");
            return Outcome::Ignored;
        }

        info!(
            chat_id = msg.chat_id,
            text_len = text.len(),
            "incoming message"
        );

        let Some(tenant) = self.directory.resolve_tenant(&msg.bot_token).await else {
            // No tenant means no trusted chat to answer into.
            warn!(chat_id = msg.chat_id, "unknown bot token, dropping message");
            return Outcome::TenantNotFound;
        };

        let Some((subscription, plan)) = self
            .directory
            .resolve_active_subscription(&tenant.id)
            .await
        else {
            warn!(tenant_id = %tenant.id, "no active subscription");
            self.respond(&msg, notices::NO_ACTIVE_SUBSCRIPTION).await;
            return Outcome::NoSubscription;
        };

        let context = self.knowledge.context_for(&tenant.id).await;
        let reply = self.generator.generate(text, &context).await;

        // Cost is only known after generation, so a denied request has
        // already incurred provider spend (measure-then-charge).
        let used = self
            .ledger
            .total_usage(
                &subscription.id,
                subscription.start_date,
                subscription.end_date,
            )
            .await;

        if used.saturating_add(reply.tokens_used) > plan.token_limit {
            info!(
                tenant_id = %tenant.id,
                used,
                cost = reply.tokens_used,
                limit = plan.token_limit,
                "token limit exceeded, denying"
            );
            self.respond(&msg, notices::QUOTA_EXCEEDED).await;
            return Outcome::QuotaExceeded;
        }

        // The reply is not held back on accounting: a failed write is the
        // ledger's (logged) problem, not the user's.
        self.ledger
            .record_usage(&subscription.id, reply.tokens_used)
            .await;

        self.respond(&msg, &reply.text).await;
        info!(
            tenant_id = %tenant.id,
            tokens = reply.tokens_used,
            "reply processed"
        );
        Outcome::Replied
    }

    /// Best-effort send back to the originating chat.
    async fn respond(&self, msg: &InboundMessage, text: &str) {
        if !self.delivery.send(&msg.bot_token, msg.chat_id, text).await {
            warn!(chat_id = msg.chat_id, "delivery failed after retries");
        }
    }
}
