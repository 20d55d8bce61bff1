use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use serde_json::{json, Value};

use crate::auth::{AuthToken, Permission};
use crate::database::models::{ApiTokenView, NewToken, TokenUpdate};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/tokens - the caller's tokens, secrets never included
pub async fn token_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
) -> ApiResult<Vec<ApiTokenView>> {
    token.require(Permission::Admin)?;
    Ok(ApiResponse::success(state.tokens().list(&token.user_id).await?))
}

/// POST /api/tokens - the plaintext secret is in this response only
pub async fn token_create(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<NewToken>, JsonRejection>,
) -> ApiResult<ApiTokenView> {
    token.require(Permission::Admin)?;
    let Json(new_token) = payload?;

    let created = state.tokens().create(&token.user_id, new_token).await?;
    Ok(ApiResponse::created(created))
}

/// GET /api/tokens/:token_id
pub async fn token_get(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(token_id): Path<String>,
) -> ApiResult<ApiTokenView> {
    token.require(Permission::Admin)?;
    let record = state.tokens().get(&token.user_id, &token_id).await?;
    Ok(ApiResponse::success(ApiTokenView::from(&record)))
}

/// PUT /api/tokens/:token_id
pub async fn token_update(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(token_id): Path<String>,
    payload: Result<Json<TokenUpdate>, JsonRejection>,
) -> ApiResult<ApiTokenView> {
    token.require(Permission::Admin)?;
    let Json(update) = payload?;

    let updated = state.tokens().update(&token.user_id, &token_id, update).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/tokens/:token_id
pub async fn token_delete(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(token_id): Path<String>,
) -> ApiResult<Value> {
    token.require(Permission::Admin)?;
    state.tokens().delete(&token.user_id, &token_id).await?;
    Ok(ApiResponse::success(json!({ "id": token_id, "deleted": true })))
}

/// POST /api/tokens/:token_id/regenerate - new secret, old one stops working
pub async fn token_regenerate(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(token_id): Path<String>,
) -> ApiResult<ApiTokenView> {
    token.require(Permission::Admin)?;
    Ok(ApiResponse::success(
        state.tokens().regenerate(&token.user_id, &token_id).await?,
    ))
}
