use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider response malformed: {0}")]
    Malformed(String),
}

/// A single-shot text-completion provider with a token-counting capability.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;

    async fn count_tokens(&self, text: &str) -> Result<i64, GenerationError>;
}
