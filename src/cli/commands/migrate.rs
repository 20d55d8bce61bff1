use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let pool = DatabaseManager::connect(&config.database.url, config.database.max_connections).await?;
    DatabaseManager::migrate(&pool).await?;

    output_success(
        &output_format,
        &format!("Migrations applied to {}", config.database.url),
        Some(json!({ "database": config.database.url })),
    )
}
