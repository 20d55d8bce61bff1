use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use serde::Serialize;
use serde_json::{json, Value};

use super::managed_table;
use crate::auth::{AuthToken, Permission};
use crate::database::models::{Column, NewTable, TableUpdate, UserTable};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Table with its columns and current row count
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetail {
    #[serde(flatten)]
    pub table: UserTable,
    pub columns: Vec<Column>,
    pub row_count: i64,
}

/// GET /api/tables - caller's tables, narrowed by the token's table list
pub async fn table_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
) -> ApiResult<Vec<UserTable>> {
    token.require(Permission::Read)?;

    let scope = if token.is_unrestricted() {
        None
    } else {
        token.table_access.as_deref()
    };
    let tables = state.tables().list_for_owner(&token.user_id, scope).await?;
    Ok(ApiResponse::success(tables))
}

/// POST /api/tables - create a table; sale/rent tables get their protected columns
pub async fn table_create(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<NewTable>, JsonRejection>,
) -> ApiResult<TableDetail> {
    token.require(Permission::Write)?;
    let Json(new_table) = payload?;

    let (table, columns) = state.tables().create(&token.user_id, new_table).await?;
    Ok(ApiResponse::created(TableDetail {
        table,
        columns,
        row_count: 0,
    }))
}

/// GET /api/tables/:table_id
pub async fn table_get(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
) -> ApiResult<TableDetail> {
    let table = managed_table(&state, &token, &table_id, Permission::Read).await?;
    let columns = state.columns().list(&table.id).await?;
    let row_count = state.tables().row_count(&table.id).await?;

    Ok(ApiResponse::success(TableDetail {
        table,
        columns,
        row_count,
    }))
}

/// PUT /api/tables/:table_id - name, description, visibility, type
pub async fn table_update(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    payload: Result<Json<TableUpdate>, JsonRejection>,
) -> ApiResult<TableDetail> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(update) = payload?;

    let table = state.tables().update(&table, update).await?;
    let columns = state.columns().list(&table.id).await?;
    let row_count = state.tables().row_count(&table.id).await?;

    Ok(ApiResponse::success(TableDetail {
        table,
        columns,
        row_count,
    }))
}

/// DELETE /api/tables/:table_id - columns and rows go with it
pub async fn table_delete(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
) -> ApiResult<Value> {
    let table = managed_table(&state, &token, &table_id, Permission::Delete).await?;
    state.tables().delete(&table).await?;
    Ok(ApiResponse::success(json!({ "id": table.id, "deleted": true })))
}
