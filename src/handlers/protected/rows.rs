use axum::extract::{rejection::JsonRejection, Extension, Json, Path, Query, State};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::managed_table;
use crate::auth::{AuthToken, Permission};
use crate::database::models::DataRow;
use crate::filter::{Filter, PaginationInfo};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct RowPage {
    pub rows: Vec<DataRow>,
    pub total: i64,
    pub pagination: PaginationInfo,
}

/// GET /api/tables/:table_id/rows?where[col]=v&limit&offset
pub async fn row_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<RowPage> {
    let table = managed_table(&state, &token, &table_id, Permission::Read).await?;
    let filter = Filter::from_query(&query, &state.config.api)?;

    let (rows, total) = state.rows().list(&table.id, &filter).await?;
    Ok(ApiResponse::success(RowPage {
        rows,
        total,
        pagination: PaginationInfo::new(total, filter.page),
    }))
}

/// POST /api/tables/:table_id/rows - validated against the table's columns
pub async fn row_create(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<DataRow> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(input) = payload?;

    let columns = state.columns().list(&table.id).await?;
    let registry = state.modules().registry().await?;
    let row = state.rows().create(&table.id, &columns, &registry, &input).await?;
    Ok(ApiResponse::created(row))
}

/// DELETE /api/tables/:table_id/rows - every row of the table
pub async fn row_delete_all(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
) -> ApiResult<Value> {
    let table = managed_table(&state, &token, &table_id, Permission::Delete).await?;
    let deleted = state.rows().delete_all(&table.id).await?;
    Ok(ApiResponse::success(json!({ "deleted": deleted })))
}

/// GET /api/tables/:table_id/rows/:row_id
pub async fn row_get(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, row_id)): Path<(String, String)>,
) -> ApiResult<DataRow> {
    let table = managed_table(&state, &token, &table_id, Permission::Read).await?;
    Ok(ApiResponse::success(state.rows().get(&table.id, &row_id).await?))
}

/// PUT /api/tables/:table_id/rows/:row_id - partial; `null` clears a field
pub async fn row_update(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, row_id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<DataRow> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(patch) = payload?;

    let columns = state.columns().list(&table.id).await?;
    let registry = state.modules().registry().await?;
    let row = state
        .rows()
        .update(&table.id, &row_id, &columns, &registry, &patch)
        .await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/tables/:table_id/rows/:row_id
pub async fn row_delete(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, row_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let table = managed_table(&state, &token, &table_id, Permission::Delete).await?;
    state.rows().delete(&table.id, &row_id).await?;
    Ok(ApiResponse::success(json!({ "id": row_id, "deleted": true })))
}
