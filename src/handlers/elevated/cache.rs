use axum::extract::{Extension, Json, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthToken, Permission};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Body of `POST /api/cache/invalidate`. With no `tableId` everything is dropped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    pub table_id: Option<String>,
}

/// POST /api/cache/invalidate {tableId?}
pub async fn cache_invalidate(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Option<Json<InvalidateRequest>>,
) -> ApiResult<Value> {
    token.require(Permission::Admin)?;
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    match request.table_id {
        Some(table_id) => {
            let table = state.tables().get(&table_id).await?;
            if table.user_id != token.user_id {
                return Err(ApiError::not_found(format!("Table not found: {}", table_id)));
            }
            state.cache.invalidate_table(&table.id).await;
            tracing::info!("Cache invalidated for table {}", table.id);
            Ok(ApiResponse::success(json!({ "invalidated": "table", "tableId": table.id })))
        }
        None => {
            state.cache.invalidate_all().await;
            tracing::info!("Cache cleared by token {}", token.id);
            Ok(ApiResponse::success(json!({ "invalidated": "all" })))
        }
    }
}
