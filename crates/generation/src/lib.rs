//! Text-generation client: a Gemini-compatible backend plus the retrying,
//! fallback-producing wrapper the pipeline consumes.

mod backend;
mod client;
pub mod gemini;

pub use {
    backend::{CompletionBackend, GenerationError},
    client::{FALLBACK_REPLY, GenerationClient},
    gemini::GeminiBackend,
};
