use sqlx::SqlitePool;
use tracing::info;

use super::column_service::{insert_column, ColumnService};
use super::{new_id, ServiceError, ServiceResult};
use crate::cache::CacheService;
use crate::columns::protected_columns;
use crate::database::models::{Column, NewTable, TableUpdate, UserTable, UserTableRecord};
use crate::types::now_timestamp;

const TABLE_FIELDS: &str = "id, user_id, name, description, table_type, visibility, created_at, updated_at";

pub struct TableService {
    pool: SqlitePool,
    cache: CacheService,
}

impl TableService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    pub async fn get(&self, table_id: &str) -> ServiceResult<UserTable> {
        if let Some(table) = self.cache.get_table(table_id).await {
            return Ok(table);
        }

        let seen = self.cache.generation();
        let record = sqlx::query_as::<_, UserTableRecord>(&format!(
            "SELECT {} FROM user_tables WHERE id = ?",
            TABLE_FIELDS
        ))
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Table", table_id))?;

        let table = UserTable::from(record);
        self.cache.set_table(&table, seen).await;
        Ok(table)
    }

    /// Owner's tables, narrowed to `scope` when the token carries a table list
    pub async fn list_for_owner(&self, user_id: &str, scope: Option<&[String]>) -> ServiceResult<Vec<UserTable>> {
        let records = sqlx::query_as::<_, UserTableRecord>(&format!(
            "SELECT {} FROM user_tables WHERE user_id = ? ORDER BY name COLLATE NOCASE, created_at",
            TABLE_FIELDS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(UserTable::from)
            .filter(|t| scope.map_or(true, |ids| ids.contains(&t.id)))
            .collect())
    }

    pub async fn row_count(&self, table_id: &str) -> ServiceResult<i64> {
        if let Some(count) = self.cache.get_row_count(table_id).await {
            return Ok(count);
        }

        let seen = self.cache.generation();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM table_rows WHERE table_id = ?")
            .bind(table_id)
            .fetch_one(&self.pool)
            .await?;

        self.cache.set_row_count(table_id, count, seen).await;
        Ok(count)
    }

    /// Create a table together with the protected columns of its type
    pub async fn create(&self, user_id: &str, new: NewTable) -> ServiceResult<(UserTable, Vec<Column>)> {
        let name = validate_name(&new.name)?;
        let now = now_timestamp();
        let table = UserTable {
            id: new_id(),
            user_id: user_id.to_string(),
            name,
            description: new.description,
            table_type: new.table_type,
            visibility: new.visibility,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO user_tables ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            TABLE_FIELDS
        ))
        .bind(&table.id)
        .bind(&table.user_id)
        .bind(&table.name)
        .bind(&table.description)
        .bind(table.table_type.as_str())
        .bind(table.visibility.as_str())
        .bind(&table.created_at)
        .bind(&table.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut columns = Vec::new();
        for (position, column) in protected_columns(table.table_type).iter().enumerate() {
            columns.push(insert_column(&mut tx, &table.id, column, position as i64).await?);
        }

        tx.commit().await?;

        self.cache.delete(crate::cache::keys::PUBLIC_TABLES).await;
        info!("Created {} table {} ({}) for user {}", table.table_type, table.id, table.name, user_id);
        Ok((table, columns))
    }

    pub async fn update(&self, table: &UserTable, update: TableUpdate) -> ServiceResult<UserTable> {
        let mut updated = table.clone();
        if let Some(name) = update.name {
            updated.name = validate_name(&name)?;
        }
        if let Some(description) = update.description {
            updated.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(visibility) = update.visibility {
            updated.visibility = visibility;
        }

        let type_changed = matches!(update.table_type, Some(t) if t != table.table_type);
        if let Some(table_type) = update.table_type {
            updated.table_type = table_type;
        }
        if type_changed && self.row_count(&table.id).await? > 0 {
            return Err(ServiceError::Conflict(
                "Cannot change the type of a table that contains rows".to_string(),
            ));
        }

        let existing = if type_changed {
            ColumnService::new(self.pool.clone(), self.cache.clone()).list(&table.id).await?
        } else {
            Vec::new()
        };

        updated.updated_at = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE user_tables SET name = ?, description = ?, table_type = ?, visibility = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.table_type.as_str())
        .bind(updated.visibility.as_str())
        .bind(&updated.updated_at)
        .bind(&updated.id)
        .execute(&mut *tx)
        .await?;

        if type_changed {
            // New protected columns replace same-named ones and go after the rest
            let mut position = existing.iter().map(|c| c.position + 1).max().unwrap_or(0);
            for column in protected_columns(updated.table_type) {
                sqlx::query("DELETE FROM table_columns WHERE table_id = ? AND name = ? COLLATE NOCASE")
                    .bind(&updated.id)
                    .bind(&column.name)
                    .execute(&mut *tx)
                    .await?;
                insert_column(&mut tx, &updated.id, &column, position).await?;
                position += 1;
            }
        }

        tx.commit().await?;

        self.cache.invalidate_table(&updated.id).await;
        info!("Updated table {}", updated.id);
        Ok(updated)
    }

    /// Columns and rows go with the table (FK cascade)
    pub async fn delete(&self, table: &UserTable) -> ServiceResult<()> {
        sqlx::query("DELETE FROM user_tables WHERE id = ?")
            .bind(&table.id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_table(&table.id).await;
        info!("Deleted table {} ({})", table.id, table.name);
        Ok(())
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::BadRequest("Table name is required".to_string()));
    }
    if name.chars().count() > 100 {
        return Err(ServiceError::BadRequest("Table name must be at most 100 characters".to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::DatabaseManager;
    use crate::services::UserService;
    use crate::types::{TableType, Visibility};

    async fn setup() -> (TableService, SqlitePool, String) {
        let pool = DatabaseManager::connect_and_migrate("sqlite::memory:", 1).await.unwrap();
        let user = UserService::new(pool.clone()).create("Owner", "owner@example.com").await.unwrap();
        let cache = CacheService::in_memory(&AppConfig::development().cache);
        (TableService::new(pool.clone(), cache), pool, user.id)
    }

    fn new_table(name: &str, table_type: TableType) -> NewTable {
        NewTable {
            name: name.into(),
            description: None,
            table_type,
            visibility: Visibility::Public,
        }
    }

    #[tokio::test]
    async fn create_adds_protected_columns() {
        let (tables, _pool, user) = setup().await;
        let (table, columns) = tables.create(&user, new_table("Bikes", TableType::Rent)).await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["price", "fee", "used", "available"]);
        assert_eq!(tables.get(&table.id).await.unwrap(), table);
        assert_eq!(tables.row_count(&table.id).await.unwrap(), 0);

        assert!(matches!(
            tables.create(&user, new_table("  ", TableType::Default)).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn type_change_adds_new_protected_columns() {
        let (tables, pool, user) = setup().await;
        let (table, _) = tables.create(&user, new_table("Stock", TableType::Default)).await.unwrap();

        let updated = tables
            .update(
                &table,
                TableUpdate {
                    table_type: Some(TableType::Sale),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.table_type, TableType::Sale);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM table_columns WHERE table_id = ?")
            .bind(&table.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn type_change_rejected_with_rows() {
        let (tables, pool, user) = setup().await;
        let (table, _) = tables.create(&user, new_table("Stock", TableType::Sale)).await.unwrap();
        sqlx::query("INSERT INTO table_rows (id, table_id, data, created_at, updated_at) VALUES ('r1', ?, '{}', '', '')")
            .bind(&table.id)
            .execute(&pool)
            .await
            .unwrap();

        let result = tables
            .update(
                &table,
                TableUpdate {
                    table_type: Some(TableType::Rent),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_cascades() {
        let (tables, pool, user) = setup().await;
        let (table, _) = tables.create(&user, new_table("Gone", TableType::Sale)).await.unwrap();
        tables.delete(&table).await.unwrap();

        assert!(matches!(tables.get(&table.id).await, Err(ServiceError::NotFound(_))));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM table_columns")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
