use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{new_id, ServiceError, ServiceResult};
use crate::cache::CacheService;
use crate::columns::{validate_row, ColumnTypeRegistry, ValidateMode};
use crate::database::models::{Column, DataRow, DataRowRecord};
use crate::filter::Filter;
use crate::types::now_timestamp;

const ROW_FIELDS: &str = "id, table_id, data, created_at, updated_at";

/// Insert already-validated row data on an open connection or transaction
pub(crate) async fn insert_row(
    conn: &mut SqliteConnection,
    table_id: &str,
    data: Map<String, Value>,
) -> Result<DataRow, sqlx::Error> {
    let now = now_timestamp();
    let row = DataRow {
        id: new_id(),
        table_id: table_id.to_string(),
        data,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(&format!("INSERT INTO table_rows ({}) VALUES (?, ?, ?, ?, ?)", ROW_FIELDS))
        .bind(&row.id)
        .bind(&row.table_id)
        .bind(Value::Object(row.data.clone()).to_string())
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(conn)
        .await?;

    Ok(row)
}

pub struct RowService {
    pool: SqlitePool,
    cache: CacheService,
}

impl RowService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    /// Page of rows matching the filter's equality conditions, newest first,
    /// with the total match count
    pub async fn list(&self, table_id: &str, filter: &Filter) -> ServiceResult<(Vec<DataRow>, i64)> {
        let (where_sql, binds) = filter.where_sql();

        let count_sql = format!("SELECT COUNT(*) FROM table_rows WHERE table_id = ?{}", where_sql);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(table_id);
        for value in &binds {
            count_query = count_query.bind(value);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {} FROM table_rows WHERE table_id = ?{} ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            ROW_FIELDS, where_sql
        );
        let mut query = sqlx::query_as::<_, DataRowRecord>(&sql).bind(table_id);
        for value in &binds {
            query = query.bind(value);
        }
        let records = query
            .bind(i64::from(filter.page.limit))
            .bind(i64::from(filter.page.offset))
            .fetch_all(&self.pool)
            .await?;

        debug!("table {}: {} of {} rows", table_id, records.len(), total);
        Ok((records.into_iter().map(DataRow::from).collect(), total))
    }

    /// Every row of a table in insertion order
    pub async fn all(&self, table_id: &str) -> ServiceResult<Vec<DataRow>> {
        let records = sqlx::query_as::<_, DataRowRecord>(&format!(
            "SELECT {} FROM table_rows WHERE table_id = ? ORDER BY created_at, id",
            ROW_FIELDS
        ))
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(DataRow::from).collect())
    }

    pub async fn get(&self, table_id: &str, row_id: &str) -> ServiceResult<DataRow> {
        if let Some(row) = self.cache.get_item(table_id, row_id).await {
            return Ok(row);
        }

        let seen = self.cache.generation();
        let row = self.fetch(table_id, row_id).await?;
        self.cache.set_item(&row, seen).await;
        Ok(row)
    }

    /// Read straight from the database, for read-modify-write paths
    pub async fn fetch(&self, table_id: &str, row_id: &str) -> ServiceResult<DataRow> {
        let record = sqlx::query_as::<_, DataRowRecord>(&format!(
            "SELECT {} FROM table_rows WHERE id = ? AND table_id = ?",
            ROW_FIELDS
        ))
        .bind(row_id)
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Row", row_id))?;

        Ok(DataRow::from(record))
    }

    pub async fn create(
        &self,
        table_id: &str,
        columns: &[Column],
        registry: &ColumnTypeRegistry,
        input: &Value,
    ) -> ServiceResult<DataRow> {
        let data = validate_row(columns, registry, input, ValidateMode::Create)?;

        let mut conn = self.pool.acquire().await?;
        let row = insert_row(&mut conn, table_id, data).await?;
        drop(conn);

        self.cache.invalidate_rows(table_id).await;
        debug!("Inserted row {} into table {}", row.id, table_id);
        Ok(row)
    }

    /// Partial update: the validated patch is merged over the stored data and
    /// explicit nulls remove the key
    pub async fn update(
        &self,
        table_id: &str,
        row_id: &str,
        columns: &[Column],
        registry: &ColumnTypeRegistry,
        patch: &Value,
    ) -> ServiceResult<DataRow> {
        let mut row = self.fetch(table_id, row_id).await?;
        let changes = validate_row(columns, registry, patch, ValidateMode::Update)?;

        for (key, value) in changes {
            if value.is_null() {
                row.data.remove(&key);
            } else {
                row.data.insert(key, value);
            }
        }
        row.updated_at = now_timestamp();

        self.write_data(&row).await?;
        self.cache.invalidate_item(table_id, row_id).await;
        Ok(row)
    }

    pub(crate) async fn write_data(&self, row: &DataRow) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE table_rows SET data = ?, updated_at = ? WHERE id = ? AND table_id = ?")
            .bind(Value::Object(row.data.clone()).to_string())
            .bind(&row.updated_at)
            .bind(&row.id)
            .bind(&row.table_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Row", &row.id));
        }
        Ok(())
    }

    pub async fn delete(&self, table_id: &str, row_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM table_rows WHERE id = ? AND table_id = ?")
            .bind(row_id)
            .bind(table_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Row", row_id));
        }

        self.cache.invalidate_item(table_id, row_id).await;
        Ok(())
    }

    pub async fn delete_all(&self, table_id: &str) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM table_rows WHERE table_id = ?")
            .bind(table_id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_rows(table_id).await;
        info!("Deleted {} rows from table {}", result.rows_affected(), table_id);
        Ok(result.rows_affected())
    }

    /// Insert pre-validated rows in one transaction
    pub async fn insert_many(&self, table_id: &str, rows: Vec<Map<String, Value>>) -> ServiceResult<Vec<DataRow>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for data in rows {
            inserted.push(insert_row(&mut tx, table_id, data).await?);
        }
        tx.commit().await?;

        self.cache.invalidate_rows(table_id).await;
        info!("Inserted {} rows into table {}", inserted.len(), table_id);
        Ok(inserted)
    }
}
