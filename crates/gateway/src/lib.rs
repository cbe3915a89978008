//! HTTP gateway: per-tenant Telegram webhooks, the WhatsApp stub, liveness,
//! and process wiring.

pub mod server;
pub mod state;
pub mod webhook;

pub use {
    server::{build_app, start_gateway},
    state::AppState,
};
