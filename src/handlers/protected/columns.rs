use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use serde_json::{json, Value};

use super::managed_table;
use crate::auth::{AuthToken, Permission};
use crate::columns::ColumnTypeInfo;
use crate::database::models::{Column, ColumnUpdate, NewColumn};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/tables/:table_id/columns - in position order
pub async fn column_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
) -> ApiResult<Vec<Column>> {
    let table = managed_table(&state, &token, &table_id, Permission::Read).await?;
    Ok(ApiResponse::success(state.columns().list(&table.id).await?))
}

/// POST /api/tables/:table_id/columns
pub async fn column_create(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    payload: Result<Json<NewColumn>, JsonRejection>,
) -> ApiResult<Column> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(column) = payload?;

    let registry = state.modules().registry().await?;
    let created = state.columns().create(&table, column, &registry).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/tables/:table_id/columns/:column_id - by id or by name
pub async fn column_update(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, column_id)): Path<(String, String)>,
    payload: Result<Json<ColumnUpdate>, JsonRejection>,
) -> ApiResult<Column> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(update) = payload?;

    let registry = state.modules().registry().await?;
    let updated = state.columns().update(&table, &column_id, update, &registry).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/tables/:table_id/columns/:column_id
pub async fn column_delete(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, column_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let table = managed_table(&state, &token, &table_id, Permission::Delete).await?;
    state.columns().delete(&table, &column_id).await?;
    Ok(ApiResponse::success(json!({ "id": column_id, "deleted": true })))
}

/// GET /api/column-types - built-ins plus the types of enabled modules
pub async fn column_types(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
) -> ApiResult<Vec<ColumnTypeInfo>> {
    token.require(Permission::Read)?;
    let registry = state.modules().registry().await?;
    Ok(ApiResponse::success(registry.list()))
}
