mod config;
mod db;
mod error;
mod llm;
mod models;
mod rate_limit;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::services::events::{EventBus, EventConfig};
use crate::services::executor::{CodeExecutor, ExecutorConfig};
use crate::store::Store;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PostgresStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    let store: Arc<dyn Store> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url).await.expect("database init failed");
            Arc::new(PostgresStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if config.seed_default_lessons {
        match services::lessons::seed_defaults(store.as_ref()).await {
            Ok(0) => {}
            Ok(seeded) => tracing::info!(seeded, "default lessons seeded"),
            Err(e) => tracing::warn!(error = %e, "default lesson seeding failed"),
        }
    }

    // Initialize LLM client (non-fatal: tutor replies stay deterministic if config missing).
    let llm: Option<Arc<dyn llm::LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; narration disabled");
            None
        }
    };

    let executor_config = ExecutorConfig::from_env();
    tracing::info!(
        interpreter = %executor_config.interpreter,
        timeout_ms = executor_config.timeout.as_millis(),
        "code executor configured"
    );

    // Spawn background event worker.
    let (events, _worker) = EventBus::spawn(store.clone(), EventConfig::from_env());

    let port = config.port;
    let state = state::AppState::new(store, llm, CodeExecutor::new(executor_config), events, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "learnflow listening");
    axum::serve(listener, app).await.expect("server failed");
}
