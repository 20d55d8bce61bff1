use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::server::AppState;

const PUBLIC_ROUTES: [&str; 10] = [
    "GET /api/public/tables",
    "GET /api/public/tables/search",
    "GET /api/public/tables/:id/items",
    "GET /api/public/tables/:id/items/:itemId",
    "GET /api/public/tables/:id/items/:itemId/availability",
    "GET /api/public/records",
    "GET /api/public/values/:column",
    "POST /api/public/buy",
    "POST /api/public/rent",
    "POST /api/public/release",
];

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "dyntables",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "health": "/health",
            "public": "/api/public/*",
            "admin": "/api/tables, /api/tokens, /api/modules, /api/column-types"
        }
    }))
}

/// GET /health and /api/public/health - no auth
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "store-public-api",
        "runtime": "rust",
        "database": database,
        "routes": PUBLIC_ROUTES,
    }))
}
