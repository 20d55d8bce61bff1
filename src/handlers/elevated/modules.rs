use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use serde_json::{json, Value};

use crate::auth::{AuthToken, Permission};
use crate::middleware::{ApiResponse, ApiResult};
use crate::modules::ModuleDefinition;
use crate::server::AppState;

// Module ids contain a slash, so routes take them percent-encoded in a single
// segment (`%40store%2Fphone-numbers`); `Path` hands back the decoded id.

/// GET /api/modules
pub async fn module_list(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
) -> ApiResult<Vec<ModuleDefinition>> {
    token.require(Permission::Admin)?;
    Ok(ApiResponse::success(state.modules().list().await?))
}

/// POST /api/modules - install a JSON definition
pub async fn module_install(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    payload: Result<Json<ModuleDefinition>, JsonRejection>,
) -> ApiResult<ModuleDefinition> {
    token.require(Permission::Admin)?;
    let Json(module) = payload?;
    Ok(ApiResponse::created(state.modules().install(module).await?))
}

/// POST /api/modules/:module_id/enable
pub async fn module_enable(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(module_id): Path<String>,
) -> ApiResult<ModuleDefinition> {
    token.require(Permission::Admin)?;
    Ok(ApiResponse::success(state.modules().set_enabled(&module_id, true).await?))
}

/// POST /api/modules/:module_id/disable - 409 while a column uses its types
pub async fn module_disable(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(module_id): Path<String>,
) -> ApiResult<ModuleDefinition> {
    token.require(Permission::Admin)?;
    Ok(ApiResponse::success(state.modules().set_enabled(&module_id, false).await?))
}

/// DELETE /api/modules/:module_id
pub async fn module_uninstall(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(module_id): Path<String>,
) -> ApiResult<Value> {
    token.require(Permission::Admin)?;
    state.modules().uninstall(&module_id).await?;
    Ok(ApiResponse::success(json!({ "id": module_id, "deleted": true })))
}
