use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::format::flatten_record;
use crate::auth::{AuthToken, Permission};
use crate::database::models::{DataRow, UserTable};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::inventory_service::Availability;
use crate::services::ServiceError;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: Option<String>,
}

/// Body of buy / rent / release
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAction {
    pub table_id: String,
    pub item_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// GET /api/public/tables/:table_id/items/:item_id/availability?quantity=n
pub async fn item_availability(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, item_id)): Path<(String, String)>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, ApiError> {
    token.require(Permission::Read)?;
    // Unparseable or non-positive quantities fall back to 1, like a missing one
    let quantity = query
        .quantity
        .and_then(|q| q.trim().parse::<u32>().ok())
        .filter(|q| *q >= 1)
        .map_or(1, i64::from);

    let table = state.public().table(&token, &table_id).await?;
    let availability = state
        .inventory()
        .availability(&table, &item_id, quantity)
        .await
        .map_err(item_not_found)?;
    Ok(Json(availability))
}

/// POST /api/public/buy {tableId, itemId, quantity}
pub async fn buy(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<InventoryAction>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(action) = payload?;
    let table = writable_table(&state, &token, &action.table_id).await?;

    let row = state
        .inventory()
        .buy(&table, &action.item_id, action.quantity)
        .await
        .map_err(item_not_found)?;
    Ok(action_response(&table, &row, json!({ "quantity": action.quantity })))
}

/// POST /api/public/rent {tableId, itemId}
pub async fn rent(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<InventoryAction>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(action) = payload?;
    let table = writable_table(&state, &token, &action.table_id).await?;

    let row = state
        .inventory()
        .rent(&table, &action.item_id)
        .await
        .map_err(item_not_found)?;
    Ok(action_response(&table, &row, Value::Null))
}

/// POST /api/public/release {tableId, itemId}
pub async fn release(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<InventoryAction>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(action) = payload?;
    let table = writable_table(&state, &token, &action.table_id).await?;

    let row = state
        .inventory()
        .release(&table, &action.item_id)
        .await
        .map_err(item_not_found)?;
    Ok(action_response(&table, &row, Value::Null))
}

async fn writable_table(state: &AppState, token: &AuthToken, table_id: &str) -> Result<UserTable, ApiError> {
    token.require(Permission::Write)?;
    if table_id.trim().is_empty() {
        return Err(ApiError::bad_request("tableId is required"));
    }
    Ok(state.public().table(token, table_id).await?)
}

fn item_not_found(err: ServiceError) -> ApiError {
    match err {
        ServiceError::NotFound(_) => ApiError::not_found("Item not found"),
        other => other.into(),
    }
}

fn action_response(table: &UserTable, row: &DataRow, extra: Value) -> Json<Value> {
    let mut body = json!({
        "success": true,
        "item": flatten_record(row, &table.name, table.table_type.as_str()),
    });
    if let Value::Object(fields) = extra {
        for (key, value) in fields {
            body[key] = value;
        }
    }
    Json(body)
}
