//! Configuration loading and env substitution.
//!
//! Config files: `parley.toml`, `parley.yaml`, or `parley.json`,
//! searched in `./` then `~/.config/parley/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, data_dir, discover_and_load, load_config},
    schema::{
        DatabaseConfig, GenerationConfig, ParleyConfig, ServerConfig, TelegramConfig,
        WebhookConfig,
    },
};
