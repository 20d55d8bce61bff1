use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{RowService, ServiceError, ServiceResult};
use crate::cache::CacheService;
use crate::database::models::{DataRow, UserTable};
use crate::types::{now_timestamp, TableType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    pub available_qty: i64,
    pub requested_qty: i64,
}

/// Stock movements on sale and rent tables. Every change is a single
/// conditional UPDATE so concurrent buyers cannot oversell.
pub struct InventoryService {
    pool: SqlitePool,
    cache: CacheService,
}

impl InventoryService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    fn rows(&self) -> RowService {
        RowService::new(self.pool.clone(), self.cache.clone())
    }

    /// Sale: `qty` on hand. Rent: 1 while the item is not `used`, else 0.
    pub async fn availability(&self, table: &UserTable, item_id: &str, quantity: i64) -> ServiceResult<Availability> {
        let row = self.rows().get(&table.id, item_id).await?;
        let available_qty = match table.table_type {
            TableType::Sale => row.data.get("qty").and_then(as_integer).unwrap_or(0),
            _ => {
                let used = row.data.get("used").and_then(|v| v.as_bool()).unwrap_or(false);
                if used {
                    0
                } else {
                    1
                }
            }
        };

        Ok(Availability {
            available: available_qty >= quantity,
            available_qty,
            requested_qty: quantity,
        })
    }

    pub async fn buy(&self, table: &UserTable, item_id: &str, quantity: i64) -> ServiceResult<DataRow> {
        require_type(table, TableType::Sale, "Buying")?;
        if quantity < 1 {
            return Err(ServiceError::BadRequest("quantity must be at least 1".to_string()));
        }

        let result = sqlx::query(
            "UPDATE table_rows SET data = json_set(data, '$.qty', COALESCE(json_extract(data, '$.qty'), 0) - ?), \
             updated_at = ? WHERE id = ? AND table_id = ? AND COALESCE(json_extract(data, '$.qty'), 0) >= ?",
        )
        .bind(quantity)
        .bind(now_timestamp())
        .bind(item_id)
        .bind(&table.id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        let row = self
            .finish(table, item_id, result.rows_affected(), "Insufficient quantity available")
            .await?;
        info!("Sold {} of item {} from table {}", quantity, item_id, table.id);
        Ok(row)
    }

    pub async fn rent(&self, table: &UserTable, item_id: &str) -> ServiceResult<DataRow> {
        require_type(table, TableType::Rent, "Renting")?;

        let result = sqlx::query(
            "UPDATE table_rows SET data = json_set(data, '$.used', json('true'), '$.available', json('false')), \
             updated_at = ? WHERE id = ? AND table_id = ? AND COALESCE(json_extract(data, '$.used'), 0) = 0",
        )
        .bind(now_timestamp())
        .bind(item_id)
        .bind(&table.id)
        .execute(&self.pool)
        .await?;

        let row = self
            .finish(table, item_id, result.rows_affected(), "Item is already rented")
            .await?;
        info!("Rented item {} from table {}", item_id, table.id);
        Ok(row)
    }

    pub async fn release(&self, table: &UserTable, item_id: &str) -> ServiceResult<DataRow> {
        require_type(table, TableType::Rent, "Releasing")?;

        let result = sqlx::query(
            "UPDATE table_rows SET data = json_set(data, '$.used', json('false'), '$.available', json('true')), \
             updated_at = ? WHERE id = ? AND table_id = ? AND json_extract(data, '$.used') = 1",
        )
        .bind(now_timestamp())
        .bind(item_id)
        .bind(&table.id)
        .execute(&self.pool)
        .await?;

        let row = self
            .finish(table, item_id, result.rows_affected(), "Item is not currently rented")
            .await?;
        info!("Released item {} in table {}", item_id, table.id);
        Ok(row)
    }

    /// Zero affected rows means either a missing item (404) or a failed
    /// stock condition (409)
    async fn finish(&self, table: &UserTable, item_id: &str, affected: u64, conflict: &str) -> ServiceResult<DataRow> {
        self.cache.invalidate_item(&table.id, item_id).await;
        let row = self.rows().fetch(&table.id, item_id).await?;
        if affected == 0 {
            return Err(ServiceError::Conflict(conflict.to_string()));
        }
        Ok(row)
    }
}

fn require_type(table: &UserTable, expected: TableType, action: &str) -> ServiceResult<()> {
    if table.table_type == expected {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!(
            "{} is only supported on {} tables",
            action, expected
        )))
    }
}

fn as_integer(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f.floor() as i64))
}
