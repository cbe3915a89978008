//! The per-message pipeline: tenant resolution, knowledge-grounded
//! generation, quota enforcement, and reply delivery.

pub mod notices;
mod pipeline;

pub use pipeline::{MAX_INBOUND_LEN, Outcome, Pipeline};
