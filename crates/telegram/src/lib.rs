//! Outbound Telegram delivery for tenant bots.

pub mod outbound;

pub use outbound::{TELEGRAM_MAX_MESSAGE_LEN, TelegramDelivery};
