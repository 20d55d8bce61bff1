use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::row_service::insert_row;
use super::{RowService, ServiceError, ServiceResult};
use crate::cache::CacheService;
use crate::columns::{validate_row, ColumnTypeRegistry, ValidateMode, ValidationError};
use crate::config::ApiConfig;
use crate::database::models::{Column, DataRow, UserTable};
use crate::generator::generate_rows;

/// Keys an exported row carries besides its data; dropped on import so an
/// export can be fed straight back in
const ENVELOPE_KEYS: [&str; 4] = ["id", "tableId", "createdAt", "updatedAt"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub rows: Vec<Value>,
    #[serde(default)]
    pub mode: ImportMode,
    #[serde(default)]
    pub skip_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowErrors {
    pub index: usize,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub mode: ImportMode,
    pub imported: usize,
    pub skipped: usize,
    pub replaced: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowErrors>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ServiceError::BadRequest(format!("Unsupported export format '{}'", other))),
        }
    }
}

pub struct TransferService {
    pool: SqlitePool,
    cache: CacheService,
    api: ApiConfig,
}

impl TransferService {
    pub fn new(pool: SqlitePool, cache: CacheService, api: ApiConfig) -> Self {
        Self { pool, cache, api }
    }

    /// Validate every row up front, then write them all in one transaction.
    /// Without `skip_invalid` a single bad row aborts the whole import.
    pub async fn import(
        &self,
        table_id: &str,
        columns: &[Column],
        registry: &ColumnTypeRegistry,
        request: ImportRequest,
    ) -> ServiceResult<ImportSummary> {
        if request.rows.len() > self.api.max_import_rows {
            return Err(ServiceError::PayloadTooLarge(format!(
                "Import is limited to {} rows, got {}",
                self.api.max_import_rows,
                request.rows.len()
            )));
        }

        let mut valid = Vec::with_capacity(request.rows.len());
        let mut errors = Vec::new();
        for (index, row) in request.rows.iter().enumerate() {
            match validate_row(columns, registry, &strip_envelope(row), ValidateMode::Create) {
                Ok(data) => valid.push(data),
                Err(ValidationError::Fields(fields)) => errors.push(RowErrors { index, errors: fields }),
                Err(other) => errors.push(RowErrors {
                    index,
                    errors: BTreeMap::from([("_row".to_string(), other.to_string())]),
                }),
            }
        }

        if !errors.is_empty() && !request.skip_invalid {
            let fields = errors
                .iter()
                .flat_map(|e| {
                    e.errors
                        .iter()
                        .map(move |(field, message)| (format!("rows[{}].{}", e.index, field), message.clone()))
                })
                .collect();
            warn!("Import into {} rejected: {} invalid rows", table_id, errors.len());
            return Err(ValidationError::Fields(fields).into());
        }

        let mut tx = self.pool.begin().await?;
        let replaced = if request.mode == ImportMode::Replace {
            sqlx::query("DELETE FROM table_rows WHERE table_id = ?")
                .bind(table_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            0
        };

        let imported = valid.len();
        for data in valid {
            insert_row(&mut tx, table_id, data).await?;
        }
        tx.commit().await?;

        self.cache.invalidate_rows(table_id).await;
        info!(
            "Imported {} rows into {} ({:?}, {} skipped, {} replaced)",
            imported,
            table_id,
            request.mode,
            errors.len(),
            replaced
        );

        Ok(ImportSummary {
            mode: request.mode,
            imported,
            skipped: errors.len(),
            replaced,
            errors,
        })
    }

    pub async fn export_json(&self, table_id: &str) -> ServiceResult<Vec<Value>> {
        let rows = RowService::new(self.pool.clone(), self.cache.clone()).all(table_id).await?;
        Ok(rows.iter().map(export_record).collect())
    }

    /// Header is `id`, the columns in position order, `createdAt`, `updatedAt`
    pub async fn export_csv(&self, table_id: &str, columns: &[Column]) -> ServiceResult<String> {
        let rows = RowService::new(self.pool.clone(), self.cache.clone()).all(table_id).await?;

        let mut ordered: Vec<&Column> = columns.iter().collect();
        ordered.sort_by_key(|c| c.position);

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["id"];
        header.extend(ordered.iter().map(|c| c.name.as_str()));
        header.extend(["createdAt", "updatedAt"]);
        writer.write_record(&header)?;

        for row in &rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.id.clone());
            record.extend(ordered.iter().map(|c| csv_cell(row.data.get(&c.name))));
            record.push(row.created_at.clone());
            record.push(row.updated_at.clone());
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Insert `count` generated rows. A seed makes the output reproducible.
    pub async fn generate(
        &self,
        table: &UserTable,
        columns: &[Column],
        registry: &ColumnTypeRegistry,
        count: usize,
        seed: Option<u64>,
    ) -> ServiceResult<Vec<DataRow>> {
        let max = self.api.max_generate_rows;
        if count == 0 || count > max {
            return Err(ServiceError::BadRequest(format!("count must be between 1 and {}", max)));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generated = generate_rows(columns, registry, table.table_type, count, &mut rng);
        let rows = RowService::new(self.pool.clone(), self.cache.clone())
            .insert_many(&table.id, generated)
            .await?;

        info!("Generated {} of {} requested rows for table {}", rows.len(), count, table.id);
        Ok(rows)
    }
}

fn strip_envelope(row: &Value) -> Value {
    match row {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `{id, ...data, createdAt, updatedAt}`
pub fn export_record(row: &DataRow) -> Value {
    let mut record = row.data.clone();
    record.insert("id".to_string(), Value::String(row.id.clone()));
    record.insert("createdAt".to_string(), Value::String(row.created_at.clone()));
    record.insert("updatedAt".to_string(), Value::String(row.updated_at.clone()));
    Value::Object(record)
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
