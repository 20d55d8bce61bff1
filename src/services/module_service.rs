use sqlx::SqlitePool;
use tracing::info;

use super::ServiceResult;
use crate::cache::CacheService;
use crate::columns::ColumnTypeRegistry;
use crate::database::models::ModuleRecord;
use crate::modules::{validate_module_id, ModuleDefinition, ModuleError};
use crate::types::now_timestamp;

pub struct ModuleService {
    pool: SqlitePool,
    cache: CacheService,
}

impl ModuleService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    pub async fn list(&self) -> ServiceResult<Vec<ModuleDefinition>> {
        if let Some(modules) = self.cache.get_modules().await {
            return Ok(modules);
        }

        let seen = self.cache.generation();
        let records = sqlx::query_as::<_, ModuleRecord>(
            "SELECT id, name, version, description, enabled, definition, installed_at FROM modules ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut modules = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            match ModuleDefinition::from_record(record) {
                Ok(module) => modules.push(module),
                Err(e) => tracing::warn!("skipping unreadable module {}: {}", id, e),
            }
        }

        self.cache.set_modules(&modules, seen).await;
        Ok(modules)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<ModuleDefinition> {
        self.list()
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ModuleError::NotFound(id.to_string()).into())
    }

    /// Column types resolvable right now: built-ins plus enabled modules
    pub async fn registry(&self) -> ServiceResult<ColumnTypeRegistry> {
        Ok(ColumnTypeRegistry::from_modules(&self.list().await?))
    }

    pub async fn install(&self, module: ModuleDefinition) -> ServiceResult<ModuleDefinition> {
        module.validate()?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM modules WHERE id = ?")
            .bind(&module.id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(ModuleError::AlreadyInstalled(module.id).into());
        }

        sqlx::query(
            "INSERT INTO modules (id, name, version, description, enabled, definition, installed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&module.id)
        .bind(&module.name)
        .bind(&module.version)
        .bind(&module.description)
        .bind(module.enabled as i64)
        .bind(module.definition_json()?)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        self.cache.invalidate_modules().await;
        info!("Installed module {} ({} column types)", module.id, module.column_types.len());
        Ok(module)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> ServiceResult<ModuleDefinition> {
        validate_module_id(id)?;
        let module = self.get(id).await?;

        if !enabled {
            self.ensure_unused(&module).await?;
        }

        sqlx::query("UPDATE modules SET enabled = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_modules().await;
        info!("Module {} {}", id, if enabled { "enabled" } else { "disabled" });
        Ok(ModuleDefinition { enabled, ..module })
    }

    pub async fn uninstall(&self, id: &str) -> ServiceResult<()> {
        validate_module_id(id)?;
        let module = self.get(id).await?;
        self.ensure_unused(&module).await?;

        sqlx::query("DELETE FROM modules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_modules().await;
        info!("Uninstalled module {}", id);
        Ok(())
    }

    /// `table.column` names of every column typed by one of the module's types
    pub async fn usage(&self, module: &ModuleDefinition) -> ServiceResult<Vec<String>> {
        let references = module.type_references();
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; references.len()].join(", ");
        let sql = format!(
            "SELECT t.name || '.' || c.name FROM table_columns c \
             JOIN user_tables t ON t.id = c.table_id \
             WHERE c.column_type IN ({}) ORDER BY t.name, c.name",
            placeholders
        );

        let mut query = sqlx::query_as::<_, (String,)>(&sql);
        for reference in &references {
            query = query.bind(reference);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn ensure_unused(&self, module: &ModuleDefinition) -> ServiceResult<()> {
        let columns = self.usage(module).await?;
        if columns.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::InUse {
                id: module.id.clone(),
                columns,
            }
            .into())
        }
    }
}
