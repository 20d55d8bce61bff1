use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::managed_table;
use crate::auth::{AuthToken, Permission};
use crate::database::models::DataRow;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::ServiceError;
use crate::services::transfer_service::{ExportFormat, ImportRequest, ImportSummary};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub count: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateSummary {
    pub requested: usize,
    pub generated: usize,
    pub rows: Vec<DataRow>,
}

/// POST /api/tables/:table_id/import {rows, mode, skipInvalid}
pub async fn table_import(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<ImportSummary> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(request) = payload?;

    let columns = state.columns().list(&table.id).await?;
    let registry = state.modules().registry().await?;
    let summary = state
        .transfer()
        .import(&table.id, &columns, &registry, request)
        .await?;
    Ok(ApiResponse::success(summary))
}

/// GET /api/tables/:table_id/export?format=json|csv - served as a download
pub async fn table_export(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let table = managed_table(&state, &token, &table_id, Permission::Read).await?;
    let format: ExportFormat = query.format.parse()?;

    let (content_type, extension, body) = match format {
        ExportFormat::Json => {
            let records = state.transfer().export_json(&table.id).await?;
            let body = serde_json::to_string_pretty(&records).map_err(ServiceError::from)?;
            ("application/json", "json", body)
        }
        ExportFormat::Csv => {
            let columns = state.columns().list(&table.id).await?;
            let body = state.transfer().export_csv(&table.id, &columns).await?;
            ("text/csv; charset=utf-8", "csv", body)
        }
    };

    let disposition = format!("attachment; filename=\"{}.{}\"", file_stem(&table.name), extension);
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// POST /api/tables/:table_id/generate {count, seed?}
pub async fn table_generate(
    State(state): State<AppState>,
    Extension(token): Extension<AuthToken>,
    Path(table_id): Path<String>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<GenerateSummary> {
    let table = managed_table(&state, &token, &table_id, Permission::Write).await?;
    let Json(request) = payload?;

    let columns = state.columns().list(&table.id).await?;
    let registry = state.modules().registry().await?;
    let rows = state
        .transfer()
        .generate(&table, &columns, &registry, request.count, request.seed)
        .await?;

    Ok(ApiResponse::created(GenerateSummary {
        requested: request.count,
        generated: rows.len(),
        rows,
    }))
}

/// Table name reduced to something safe inside a quoted filename
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "export".to_string()
    } else {
        stem
    }
}
