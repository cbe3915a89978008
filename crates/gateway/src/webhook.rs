//! Inbound webhook handling.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, warn},
};

use {
    parley_common::InboundMessage,
    parley_config::WebhookConfig,
    parley_pipeline::Outcome,
};

use crate::state::AppState;

/// `X-Telegram-Bot-Api-Secret-Token`, the header Telegram attaches when a
/// `secret_token` was set on the webhook. Lowercase, as the http crate
/// stores header names.
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

// ── Payload types ───────────────────────────────────────────────────────────
// Minimal view of a Telegram update; unknown fields are ignored.

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// `POST /webhook/telegram/{bot_token}` — the per-tenant inbound endpoint.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(bot_token): Path<String>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Response {
    if !authorized(&headers, &state.webhook) {
        warn!("webhook rejected: secret check failed");
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"status": "error", "detail": "Unauthorized"}),
        );
    }

    let Some(message) = update.message else {
        // Edits, callbacks, and other non-message updates are acknowledged
        // and skipped.
        debug!("webhook update without a message, ignoring");
        return reply(StatusCode::OK, json!({"status": "ignored"}));
    };

    let outcome = state
        .pipeline
        .handle(InboundMessage {
            bot_token,
            chat_id: message.chat.id,
            text: message.text.unwrap_or_default(),
        })
        .await;

    match outcome {
        Outcome::Replied => reply(StatusCode::OK, json!({"status": "success"})),
        Outcome::Ignored => reply(StatusCode::OK, json!({"status": "ignored"})),
        Outcome::NoSubscription => reply(
            StatusCode::OK,
            json!({"status": "error", "detail": "No active subscription"}),
        ),
        Outcome::QuotaExceeded => reply(
            StatusCode::OK,
            json!({"status": "error", "detail": "Token limit exceeded"}),
        ),
        Outcome::TenantNotFound => reply(
            StatusCode::NOT_FOUND,
            json!({"status": "error", "detail": "Tenant not found"}),
        ),
        Outcome::Failed => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"status": "error", "detail": "Internal error"}),
        ),
    }
}

/// `POST /webhook/whatsapp` — documented stub for the second channel.
pub async fn whatsapp_webhook() -> Response {
    reply(
        StatusCode::OK,
        json!({"status": "error", "detail": "WhatsApp channel is not yet implemented"}),
    )
}

// ── Auth ────────────────────────────────────────────────────────────────────

/// Shared-secret gate: a configured secret must match the Telegram header;
/// with no secret, only the explicit `open` development mode lets
/// requests through.
fn authorized(headers: &HeaderMap, config: &WebhookConfig) -> bool {
    match &config.secret {
        Some(secret) => headers
            .get(TELEGRAM_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|presented| constant_time_eq(presented, secret.expose_secret())),
        None => config.open,
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn reply(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}
