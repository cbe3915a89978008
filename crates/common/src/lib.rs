//! Shared types and the retry policy used across all parley crates.

pub mod retry;
pub mod text;
pub mod types;

pub use {
    retry::RetryPolicy,
    types::{DeliveryChannel, GeneratedReply, InboundMessage, ReplyGenerator},
};
