use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::token_service::table_access;
use super::{ColumnService, RowService, ServiceError, ServiceResult, TableService};
use crate::api::format::{flatten_record, item_view, project_columns};
use crate::auth::AuthToken;
use crate::cache::{CacheService, CachedQuery};
use crate::database::models::{DataRow, DataRowRecord, PublicTable, UserTable};
use crate::filter::{Filter, FilterError, PaginationInfo};
use crate::types::is_identifier;

const PUBLIC_TABLE_FIELDS: &str = "t.id, t.name, t.description, t.table_type, \
     (SELECT COUNT(*) FROM table_rows r WHERE r.table_id = t.id) AS row_count";

#[derive(Debug, Clone, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<PublicTable>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub tables: Vec<PublicTable>,
    pub count: usize,
    pub searched_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsResponse {
    pub items: Vec<Value>,
    pub table_id: String,
    pub table_name: String,
    pub table_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordsResponse {
    pub records: Vec<Value>,
    pub count: usize,
    pub total: i64,
    pub pagination: PaginationInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesResponse {
    pub column: String,
    pub values: Vec<Value>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, String>>,
    pub tables_sampled: Vec<String>,
}

/// Read side of the public API: sale and rent tables reachable by a token
pub struct PublicService {
    pool: SqlitePool,
    cache: CacheService,
}

impl PublicService {
    pub fn new(pool: SqlitePool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    /// Sale/rent tables the token can reach, by name. The unrestricted
    /// listing is shared by every such token and cached.
    pub async fn tables(&self, token: &AuthToken) -> ServiceResult<Vec<PublicTable>> {
        match token.allowed_table_ids() {
            Some(ids) if ids.is_empty() => Ok(Vec::new()),
            Some(ids) => {
                let sql = format!(
                    "SELECT {} FROM user_tables t WHERE t.id IN ({}) AND t.table_type IN ('sale', 'rent') \
                     ORDER BY t.name ASC",
                    PUBLIC_TABLE_FIELDS,
                    placeholders(ids.len())
                );
                let mut query = sqlx::query_as::<_, PublicTable>(&sql);
                for id in &ids {
                    query = query.bind(id);
                }
                Ok(query.fetch_all(&self.pool).await?)
            }
            None => {
                if let Some(tables) = self.cache.get_public_tables().await {
                    return Ok(tables);
                }
                let tables = sqlx::query_as::<_, PublicTable>(&format!(
                    "SELECT {} FROM user_tables t WHERE t.visibility IN ('public', 'shared') \
                     AND t.table_type IN ('sale', 'rent') ORDER BY t.name ASC",
                    PUBLIC_TABLE_FIELDS
                ))
                .fetch_all(&self.pool)
                .await?;
                self.cache.set_public_tables(&tables).await;
                Ok(tables)
            }
        }
    }

    /// Reachable tables having every one of `columns` (case-insensitive)
    pub async fn search(&self, token: &AuthToken, columns: &str) -> ServiceResult<SearchResponse> {
        let wanted: Vec<String> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if wanted.is_empty() {
            return Err(ServiceError::BadRequest("columns parameter is required".to_string()));
        }

        let column_service = self.columns();
        let mut matching = Vec::new();
        for table in self.tables(token).await? {
            let names: Vec<String> = column_service
                .list(&table.id)
                .await?
                .into_iter()
                .map(|c| c.name.to_lowercase())
                .collect();
            if wanted.iter().all(|w| names.contains(&w.to_lowercase())) {
                matching.push(table);
            }
        }

        Ok(SearchResponse {
            count: matching.len(),
            tables: matching,
            searched_columns: wanted,
        })
    }

    /// Look up a table for the public API: 404 when missing, 403 when the
    /// token cannot reach it or it is not a sale/rent table
    pub async fn table(&self, token: &AuthToken, table_id: &str) -> ServiceResult<UserTable> {
        let table = TableService::new(self.pool.clone(), self.cache.clone())
            .get(table_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => ServiceError::NotFound("Table not found".to_string()),
                other => other,
            })?;

        if !table_access(&self.cache, token, &table).await {
            return Err(ServiceError::Forbidden("Table is not accessible with this token".to_string()));
        }
        if !table.table_type.is_inventory() {
            return Err(ServiceError::Forbidden(
                "This endpoint only supports sale and rent tables".to_string(),
            ));
        }
        Ok(table)
    }

    pub async fn items(&self, token: &AuthToken, table_id: &str, flat: bool) -> ServiceResult<ItemsResponse> {
        let table = self.table(token, table_id).await?;
        let records = sqlx::query_as::<_, DataRowRecord>(
            "SELECT id, table_id, data, created_at, updated_at FROM table_rows WHERE table_id = ? \
             ORDER BY created_at DESC, id",
        )
        .bind(&table.id)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<Value> = records
            .into_iter()
            .map(DataRow::from)
            .map(|row| {
                if flat {
                    flatten_record(&row, &table.name, table.table_type.as_str())
                } else {
                    item_view(&row)
                }
            })
            .collect();

        Ok(ItemsResponse {
            count: items.len(),
            items,
            table_id: table.id,
            table_name: table.name,
            table_type: table.table_type.to_string(),
        })
    }

    pub async fn item(&self, token: &AuthToken, table_id: &str, item_id: &str) -> ServiceResult<Value> {
        let table = self.table(token, table_id).await?;
        let row = self.rows().get(&table.id, item_id).await.map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::NotFound("Item not found".to_string()),
            other => other,
        })?;
        Ok(flatten_record(&row, &table.name, table.table_type.as_str()))
    }

    /// Flattened records across every reachable table, newest update first
    pub async fn records(&self, token: &AuthToken, filter: &Filter) -> ServiceResult<RecordsResponse> {
        let filters = Some(filter.conditions.clone()).filter(|c| !c.is_empty());
        let tables = self.tables(token).await?;
        if tables.is_empty() {
            return Ok(RecordsResponse {
                records: Vec::new(),
                count: 0,
                total: 0,
                pagination: PaginationInfo::new(0, filter.page),
                filters,
            });
        }

        let table_ids: Vec<String> = tables.iter().map(|t| t.id.clone()).collect();
        let cacheable = token.allowed_table_ids().is_none() && filter.columns.is_none();
        let (limit, offset) = (filter.page.limit, filter.page.offset);

        let cached = if cacheable {
            self.cache.get_query(&table_ids, &filter.conditions, limit, offset).await
        } else {
            None
        };

        let page = match cached {
            Some(page) => page,
            None => {
                let page = self.query_records(&tables, filter).await?;
                if cacheable {
                    self.cache
                        .set_query(&table_ids, &filter.conditions, limit, offset, &page)
                        .await;
                }
                page
            }
        };

        let records: Vec<Value> = match &filter.columns {
            Some(columns) => page
                .records
                .into_iter()
                .map(|r| project_columns(r, columns))
                .collect(),
            None => page.records,
        };

        Ok(RecordsResponse {
            count: records.len(),
            records,
            total: page.total,
            pagination: PaginationInfo::new(page.total, filter.page),
            filters,
        })
    }

    async fn query_records(&self, tables: &[PublicTable], filter: &Filter) -> ServiceResult<CachedQuery> {
        let (where_sql, binds) = filter.where_sql();
        let scope = format!("table_id IN ({}){}", placeholders(tables.len()), where_sql);

        let count_sql = format!("SELECT COUNT(*) FROM table_rows WHERE {}", scope);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for table in tables {
            count_query = count_query.bind(&table.id);
        }
        for value in &binds {
            count_query = count_query.bind(value);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT id, table_id, data, created_at, updated_at FROM table_rows WHERE {} \
             ORDER BY updated_at DESC, id LIMIT ? OFFSET ?",
            scope
        );
        let mut query = sqlx::query_as::<_, DataRowRecord>(&sql);
        for table in tables {
            query = query.bind(&table.id);
        }
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query
            .bind(i64::from(filter.page.limit))
            .bind(i64::from(filter.page.offset))
            .fetch_all(&self.pool)
            .await?;

        let by_id: HashMap<&str, &PublicTable> = tables.iter().map(|t| (t.id.as_str(), t)).collect();
        let records = rows
            .into_iter()
            .map(DataRow::from)
            .map(|row| {
                let (name, table_type) = by_id
                    .get(row.table_id.as_str())
                    .map(|t| (t.name.as_str(), t.table_type.as_str()))
                    .unwrap_or(("Unknown", "unknown"));
                flatten_record(&row, name, table_type)
            })
            .collect();

        debug!("public records: {} tables, {} matches", tables.len(), total);
        Ok(CachedQuery { records, total })
    }

    /// Distinct non-null values of `column` across the reachable tables that
    /// define it
    pub async fn values(
        &self,
        token: &AuthToken,
        column: &str,
        conditions: &BTreeMap<String, String>,
    ) -> ServiceResult<ValuesResponse> {
        if !is_identifier(column) {
            return Err(FilterError::InvalidColumn(column.to_string()).into());
        }
        let filters = Some(conditions.clone()).filter(|c| !c.is_empty());

        // Stored key spelling per table, since JSON paths are case-sensitive
        let column_service = self.columns();
        let mut eligible: Vec<(PublicTable, String)> = Vec::new();
        for table in self.tables(token).await? {
            let found = column_service
                .list(&table.id)
                .await?
                .into_iter()
                .find(|c| c.name.eq_ignore_ascii_case(column));
            if let Some(found) = found {
                eligible.push((table, found.name));
            }
        }

        let mut values: Vec<Value> = Vec::new();
        let (where_sql, binds) = crate::filter::FilterWhere::generate(conditions);
        for (table, key) in &eligible {
            let extract = format!(
                "CASE json_type(data, '$.{key}') WHEN 'true' THEN 'true' WHEN 'false' THEN 'false' \
                 ELSE json_quote(json_extract(data, '$.{key}')) END",
                key = key
            );
            let sql = format!(
                "SELECT DISTINCT {extract} AS v FROM table_rows WHERE table_id = ? \
                 AND json_type(data, '$.{key}') NOT IN ('null') {where_sql} ORDER BY v",
                extract = extract,
                key = key,
                where_sql = where_sql
            );
            let mut query = sqlx::query_as::<_, (String,)>(&sql).bind(&table.id);
            for value in &binds {
                query = query.bind(value);
            }
            for (raw,) in query.fetch_all(&self.pool).await? {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) if !values.contains(&value) => values.push(value),
                    Ok(_) => {}
                    Err(e) => debug!("skipping undecodable value {:?}: {}", raw, e),
                }
            }
        }

        Ok(ValuesResponse {
            column: column.to_string(),
            count: values.len(),
            values,
            filters,
            tables_sampled: eligible.into_iter().map(|(t, _)| t.name).collect(),
        })
    }

    fn columns(&self) -> ColumnService {
        ColumnService::new(self.pool.clone(), self.cache.clone())
    }

    fn rows(&self) -> RowService {
        RowService::new(self.pool.clone(), self.cache.clone())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
