use std::sync::Arc;

use {parley_config::WebhookConfig, parley_pipeline::Pipeline};

/// Shared app state: the pipeline plus what the handlers need around it.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub webhook: WebhookConfig,
    /// Deployment environment label, surfaced by `/health`.
    pub environment: String,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, webhook: WebhookConfig, environment: String) -> Self {
        Self {
            pipeline,
            webhook,
            environment,
        }
    }
}
