use async_trait::async_trait;

/// One inbound chat message, as decoded at the transport boundary.
///
/// Ephemeral: never persisted. The bot token from the webhook path is the
/// sole identity anchor mapping the message to a tenant.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub bot_token: String,
    pub chat_id: i64,
    pub text: String,
}

/// A generated reply plus the token cost attributed to producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub tokens_used: i64,
}

/// Produces knowledge-grounded replies.
///
/// Implementations absorb provider failures: after the retry budget they
/// return fallback text with a best-effort token estimate instead of an
/// error, so callers never branch on failure here.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, user_message: &str, context: &str) -> GeneratedReply;
}

/// Sends a reply back over the messaging channel.
///
/// `false` means the retry budget was exhausted; the send was best-effort
/// and callers do not escalate further.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, bot_token: &str, chat_id: i64, text: &str) -> bool;
}
