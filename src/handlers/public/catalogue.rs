use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::{AuthToken, Permission};
use crate::error::ApiError;
use crate::filter::{Filter, FilterWhere};
use crate::server::AppState;
use crate::services::public_service::{ItemsResponse, RecordsResponse, SearchResponse, TablesResponse, ValuesResponse};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub columns: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub flat: Option<String>,
}

/// GET /api/public/tables
pub async fn tables_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
) -> Result<Json<TablesResponse>, ApiError> {
    token.require(Permission::Read)?;
    let tables = state.public().tables(&token).await?;
    Ok(Json(TablesResponse {
        count: tables.len(),
        tables,
    }))
}

/// GET /api/public/tables/search?columns=a,b
pub async fn tables_search(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    token.require(Permission::Read)?;
    Ok(Json(state.public().search(&token, &query.columns).await?))
}

/// GET /api/public/tables/:table_id/items[?flat=true]
pub async fn items_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    token.require(Permission::Read)?;
    let flat = query.flat.as_deref() == Some("true");
    Ok(Json(state.public().items(&token, &table_id, flat).await?))
}

/// GET /api/public/tables/:table_id/items/:item_id
pub async fn item_get(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path((table_id, item_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    token.require(Permission::Read)?;
    Ok(Json(state.public().item(&token, &table_id, &item_id).await?))
}

/// GET /api/public/records?where[col]=v&limit&offset&columns=a,b
pub async fn records_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<RecordsResponse>, ApiError> {
    token.require(Permission::Read)?;
    let filter = Filter::from_query(&query, &state.config.api)?;
    Ok(Json(state.public().records(&token, &filter).await?))
}

/// GET /api/public/values/:column?where[col]=v
pub async fn values_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(column): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ValuesResponse>, ApiError> {
    token.require(Permission::Read)?;
    let conditions = FilterWhere::extract(&query)?;
    Ok(Json(state.public().values(&token, &column, &conditions).await?))
}
