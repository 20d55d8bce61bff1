use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::{new_id, ServiceError, ServiceResult};
use crate::cache::CacheService;
use crate::columns::{check_definition, is_protected, ColumnTypeRegistry};
use crate::database::models::{Column, ColumnRecord, ColumnUpdate, NewColumn, UserTable};
use crate::types::now_timestamp;

const COLUMN_FIELDS: &str =
    "id, table_id, name, column_type, is_required, default_value, validation, position, created_at, updated_at";

/// Insert one column definition on an open connection or transaction
pub(crate) async fn insert_column(
    conn: &mut SqliteConnection,
    table_id: &str,
    column: &NewColumn,
    position: i64,
) -> Result<Column, sqlx::Error> {
    let now = now_timestamp();
    let record = ColumnRecord {
        id: new_id(),
        table_id: table_id.to_string(),
        name: column.name.clone(),
        column_type: column.column_type.trim().to_string(),
        is_required: column.is_required as i64,
        default_value: column.default_value.as_ref().filter(|v| !v.is_null()).map(Value::to_string),
        validation: column
            .validation
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok()),
        position,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO table_columns ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        COLUMN_FIELDS
    ))
    .bind(&record.id)
    .bind(&record.table_id)
    .bind(&record.name)
    .bind(&record.column_type)
    .bind(record.is_required)
    .bind(&record.default_value)
    .bind(&record.validation)
    .bind(record.position)
    .bind(&record.created_at)
    .bind(&record.updated_at)
    .execute(conn)
    .await?;

    Ok(Column::from(record))
}

pub struct ColumnService {
    pool: SqlitePool,
    cache: CacheService,
}

impl ColumnService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    pub async fn list(&self, table_id: &str) -> ServiceResult<Vec<Column>> {
        if let Some(columns) = self.cache.get_columns(table_id).await {
            return Ok(columns);
        }

        let seen = self.cache.generation();
        let records = sqlx::query_as::<_, ColumnRecord>(&format!(
            "SELECT {} FROM table_columns WHERE table_id = ? ORDER BY position, created_at",
            COLUMN_FIELDS
        ))
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;

        let columns: Vec<Column> = records.into_iter().map(Column::from).collect();
        self.cache.set_columns(table_id, &columns, seen).await;
        Ok(columns)
    }

    pub async fn get(&self, table_id: &str, column_id: &str) -> ServiceResult<Column> {
        self.list(table_id)
            .await?
            .into_iter()
            .find(|c| c.id == column_id || c.name == column_id)
            .ok_or_else(|| ServiceError::not_found("Column", column_id))
    }

    pub async fn create(
        &self,
        table: &UserTable,
        mut column: NewColumn,
        registry: &ColumnTypeRegistry,
    ) -> ServiceResult<Column> {
        column.name = column.name.trim().to_string();
        column.default_value = check_definition(&column, registry)?;

        if is_protected(table.table_type, &column.name) {
            return Err(ServiceError::Forbidden(format!(
                "'{}' is a protected column of {} tables",
                column.name, table.table_type
            )));
        }

        let existing = self.list(&table.id).await?;
        if existing.iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
            return Err(ServiceError::Conflict(format!("Column '{}' already exists", column.name)));
        }

        let position = column
            .position
            .unwrap_or_else(|| existing.iter().map(|c| c.position + 1).max().unwrap_or(0));

        let mut conn = self.pool.acquire().await?;
        let created = insert_column(&mut conn, &table.id, &column, position).await?;
        drop(conn);

        self.cache.invalidate_columns(&table.id).await;
        info!("Added column {} ({}) to table {}", created.name, created.column_type, table.id);
        Ok(created)
    }

    /// Protected columns only accept a new position. Renames carry the stored
    /// values over to the new key.
    pub async fn update(
        &self,
        table: &UserTable,
        column_id: &str,
        update: ColumnUpdate,
        registry: &ColumnTypeRegistry,
    ) -> ServiceResult<Column> {
        let current = self.get(&table.id, column_id).await?;

        if is_protected(table.table_type, &current.name) {
            let changes_definition = update.name.is_some()
                || update.column_type.is_some()
                || update.is_required.is_some()
                || update.default_value.is_some()
                || update.validation.is_some();
            if changes_definition {
                return Err(ServiceError::Forbidden(format!(
                    "'{}' is a protected column and cannot be modified",
                    current.name
                )));
            }
        }

        let mut next = NewColumn {
            name: update.name.map(|n| n.trim().to_string()).unwrap_or_else(|| current.name.clone()),
            column_type: update.column_type.unwrap_or_else(|| current.column_type.clone()),
            is_required: update.is_required.unwrap_or(current.is_required),
            default_value: update.default_value.or_else(|| current.default_value.clone()),
            validation: update.validation.or_else(|| current.validation.clone()),
            position: Some(update.position.unwrap_or(current.position)),
        };
        next.default_value = check_definition(&next, registry)?;

        let renamed = next.name != current.name;
        if renamed {
            if is_protected(table.table_type, &next.name) {
                return Err(ServiceError::Forbidden(format!("'{}' is a protected column name", next.name)));
            }
            let existing = self.list(&table.id).await?;
            if existing
                .iter()
                .any(|c| c.id != current.id && c.name.eq_ignore_ascii_case(&next.name))
            {
                return Err(ServiceError::Conflict(format!("Column '{}' already exists", next.name)));
            }
        }

        let renamed_rows = if renamed {
            self.renamed_row_data(&table.id, &current.name, &next.name).await?
        } else {
            Vec::new()
        };

        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE table_columns SET name = ?, column_type = ?, is_required = ?, default_value = ?, \
             validation = ?, position = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&next.name)
        .bind(next.column_type.trim())
        .bind(next.is_required as i64)
        .bind(next.default_value.as_ref().map(Value::to_string))
        .bind(next.validation.as_ref().and_then(|v| serde_json::to_string(v).ok()))
        .bind(next.position.unwrap_or(current.position))
        .bind(&now)
        .bind(&current.id)
        .execute(&mut *tx)
        .await?;

        for (row_id, data) in &renamed_rows {
            sqlx::query("UPDATE table_rows SET data = ?, updated_at = ? WHERE id = ?")
                .bind(data)
                .bind(&now)
                .bind(row_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.cache.invalidate_columns(&table.id).await;
        if renamed {
            self.cache.invalidate_rows(&table.id).await;
        }

        info!("Updated column {} on table {}", current.id, table.id);
        self.get(&table.id, &current.id).await
    }

    pub async fn delete(&self, table: &UserTable, column_id: &str) -> ServiceResult<()> {
        let column = self.get(&table.id, column_id).await?;
        if is_protected(table.table_type, &column.name) {
            return Err(ServiceError::Forbidden(format!(
                "'{}' is a protected column and cannot be deleted",
                column.name
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM table_columns WHERE id = ?")
            .bind(&column.id)
            .execute(&mut *tx)
            .await?;
        // Column names are identifiers, safe inside a JSON path
        sqlx::query(&format!(
            "UPDATE table_rows SET data = json_remove(data, '$.{}') WHERE table_id = ?",
            column.name
        ))
        .bind(&table.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.cache.invalidate_columns(&table.id).await;
        self.cache.invalidate_rows(&table.id).await;
        info!("Deleted column {} from table {}", column.name, table.id);
        Ok(())
    }

    /// Row data with `from` moved to `to`, for rows that have the key
    async fn renamed_row_data(&self, table_id: &str, from: &str, to: &str) -> ServiceResult<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, data FROM table_rows WHERE table_id = ?")
            .bind(table_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::new();
        for (id, raw) in rows {
            let mut data: Map<String, Value> = match serde_json::from_str(&raw) {
                Ok(Value::Object(map)) => map,
                _ => continue,
            };
            if let Some(value) = data.remove(from) {
                data.insert(to.to_string(), value);
                out.push((id, Value::Object(data).to_string()));
            }
        }
        Ok(out)
    }
}
