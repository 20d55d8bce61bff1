use std::sync::Arc;

use dyntables::config::config;
use dyntables::database::DatabaseManager;
use dyntables::server::{serve, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting dyntables in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_and_migrate(&config.database.url, config.database.max_connections).await?;
    let state = AppState::new(pool, Arc::new(config.clone()));

    serve(state, config.server.port).await
}
