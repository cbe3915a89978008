//! The retrying generation client the pipeline consumes.

use std::sync::Arc;

use {async_trait::async_trait, tracing::warn};

use parley_common::{GeneratedReply, ReplyGenerator, RetryPolicy};

use crate::backend::CompletionBackend;

/// Reply used once the retry budget is exhausted. The turn is still metered
/// with an estimated token cost.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a few minutes.";

pub struct GenerationClient {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryPolicy,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Run the completion with the bounded retry schedule. `None` means the
    /// budget is spent; empty completions count as failures.
    async fn complete_with_retry(&self, prompt: &str) -> Option<String> {
        let mut attempt = 1u32;
        loop {
            match self.backend.complete(prompt).await {
                Ok(text) if !text.trim().is_empty() => return Some(text),
                Ok(_) => {
                    warn!(attempt, "provider returned an empty completion");
                },
                Err(e) => {
                    warn!(attempt, error = %e, "completion attempt failed");
                },
            }
            if !self.retry.has_attempts_left(attempt) {
                return None;
            }
            tokio::time::sleep(self.retry.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    /// Prompt tokens (user message + context) plus completion tokens, or the
    /// character heuristic when the counting call fails.
    async fn measure(&self, user_message: &str, context: &str, reply: &str) -> i64 {
        let prompt_text = format!("{user_message}{context}");
        let prompt_tokens = self.backend.count_tokens(&prompt_text).await;
        let reply_tokens = self.backend.count_tokens(reply).await;

        match (prompt_tokens, reply_tokens) {
            (Ok(p), Ok(r)) => (p + r).max(0),
            (prompt_res, reply_res) => {
                if let Some(e) = prompt_res.err().or(reply_res.err()) {
                    warn!(error = %e, "token counting failed, falling back to character estimate");
                }
                estimate_tokens(user_message, context, reply)
            },
        }
    }
}

/// Rough cost estimate: total characters divided by four, and at least one
/// so a metered turn is never free.
fn estimate_tokens(user_message: &str, context: &str, reply: &str) -> i64 {
    let chars = user_message.len() + context.len() + reply.len();
    ((chars / 4) as i64).max(1)
}

/// The fixed support-agent instruction wrapped around every request.
fn build_prompt(user_message: &str, context: &str) -> String {
    format!(
        "You are a customer support agent. Your responses must be helpful, \
         friendly, and professional.\n\
         Use the following knowledge base to answer the user's question.\n\
         If the answer is not in the knowledge base, state that you don't have \
         that information and provide the company's support contact details \
         from the knowledge base.\n\n\
         Knowledge Base:\n---\n{context}\n---\n\n\
         User's Question:\n---\n{user_message}\n---\n\n\
         Answer:"
    )
}

#[async_trait]
impl ReplyGenerator for GenerationClient {
    async fn generate(&self, user_message: &str, context: &str) -> GeneratedReply {
        let prompt = build_prompt(user_message, context);
        let text = match self.complete_with_retry(&prompt).await {
            Some(text) => text,
            None => {
                warn!("generation retries exhausted, using fallback reply");
                FALLBACK_REPLY.to_string()
            },
        };
        let tokens_used = self.measure(user_message, context, &text).await;
        GeneratedReply { text, tokens_used }
    }
}
