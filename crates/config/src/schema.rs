//! Config schema types (server, database, generation, telegram, webhook).

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Deployment environment label, surfaced by `/health`.
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
    pub telegram: TelegramConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8788,
        }
    }
}

/// SQLite database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path. Defaults to `<data dir>/parley.db`.
    pub path: Option<PathBuf>,
}

/// Text-generation provider configuration (Gemini-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key (use `${GOOGLE_API_KEY}` to pull from the environment).
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub base_url: String,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Attempt budget for one generation call.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    pub retry_base_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            timeout_seconds: 30,
            max_attempts: 3,
            retry_base_ms: 500,
        }
    }
}

/// Telegram delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API base URL (override for self-hosted bot API servers).
    pub api_url: String,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Attempt budget for one outbound send.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    pub retry_base_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".into(),
            timeout_seconds: 45,
            max_attempts: 3,
            retry_base_ms: 500,
        }
    }
}

/// Inbound webhook authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret expected in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret: Option<Secret<String>>,
    /// Development bypass: accept webhooks without a secret check.
    pub open: bool,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
