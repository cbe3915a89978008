use std::{sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    chrono::Utc,
    tower_http::cors::{Any, CorsLayer},
    tracing::{info, warn},
};

use {
    parley_common::RetryPolicy,
    parley_config::ParleyConfig,
    parley_directory::TenantDirectory,
    parley_generation::{GeminiBackend, GenerationClient},
    parley_knowledge::KnowledgeRetriever,
    parley_ledger::UsageLedger,
    parley_pipeline::Pipeline,
    parley_store::{SqliteTenantStore, TenantStore},
    parley_telegram::TelegramDelivery,
};

use crate::{state::AppState, webhook};

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/webhook/telegram/{bot_token}",
            post(webhook::telegram_webhook),
        )
        .route("/webhook/whatsapp", post(webhook::whatsapp_webhook))
        .layer(cors)
        .with_state(state)
}

/// Start the gateway: open the database, wire the long-lived clients into
/// one shared pipeline, and serve HTTP.
pub async fn start_gateway(config: ParleyConfig) -> anyhow::Result<()> {
    let pool = open_database(&config).await?;
    SqliteTenantStore::init(&pool).await?;
    let store: Arc<dyn TenantStore> = Arc::new(SqliteTenantStore::new(pool));

    let api_key = config
        .generation
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("generation.api_key is not configured"))?;
    let backend = GeminiBackend::new(
        &config.generation.base_url,
        &config.generation.model,
        api_key,
        Duration::from_secs(config.generation.timeout_seconds),
    )?;
    let generator = GenerationClient::new(
        Arc::new(backend),
        RetryPolicy::new(
            config.generation.max_attempts,
            Duration::from_millis(config.generation.retry_base_ms),
        ),
    );

    let delivery = TelegramDelivery::new(
        &config.telegram.api_url,
        Duration::from_secs(config.telegram.timeout_seconds),
        RetryPolicy::new(
            config.telegram.max_attempts,
            Duration::from_millis(config.telegram.retry_base_ms),
        ),
    )?;

    let pipeline = Arc::new(Pipeline::new(
        TenantDirectory::new(Arc::clone(&store)),
        KnowledgeRetriever::new(Arc::clone(&store)),
        UsageLedger::new(store),
        Arc::new(generator),
        Arc::new(delivery),
    ));

    if config.webhook.secret.is_none() {
        if config.webhook.open {
            warn!("webhook secret check disabled (webhook.open = true)");
        } else {
            warn!("no webhook secret configured; all webhooks will be rejected");
        }
    }

    let state = AppState::new(
        pipeline,
        config.webhook.clone(),
        config.environment.as_str().to_string(),
    );
    let app = build_app(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, environment = config.environment.as_str(), "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Open (creating if needed) the SQLite database from config.
pub async fn open_database(config: &ParleyConfig) -> anyhow::Result<sqlx::SqlitePool> {
    let db_path = config
        .database
        .path
        .clone()
        .unwrap_or_else(|| parley_config::data_dir().join("parley.db"));
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    Ok(sqlx::SqlitePool::connect(&db_url).await?)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
