use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{keys, KvStore, MemoryKvStore};
use crate::config::CacheConfig;
use crate::database::models::{ApiTokenRecord, Column, DataRow, PublicTable, UserTable};
use crate::modules::ModuleDefinition;

/// Cached page of public records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuery {
    pub records: Vec<Value>,
    pub total: i64,
}

/// Typed, namespaced access to the KV store. Backend failures are logged and
/// treated as misses; the cache never fails a request.
///
/// Fills of database reads carry the generation observed before the read.
/// Every invalidation bumps the generation first, so a fill that raced with
/// a write is dropped instead of reinstating the old value.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn KvStore>,
    generation: Arc<AtomicU64>,
    enabled: bool,
    query_ttl: Duration,
    public_tables_ttl: Duration,
}

impl CacheService {
    pub fn new(store: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            generation: Arc::new(AtomicU64::new(0)),
            enabled: config.enabled,
            query_ttl: Duration::from_secs(config.query_ttl_secs),
            public_tables_ttl: Duration::from_secs(config.public_tables_ttl_secs),
        }
    }

    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(Arc::new(MemoryKvStore::new()), config)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot to take before a database read whose result will be cached
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("cache miss: {}", key);
                return None;
            }
            Err(e) => {
                warn!("cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("dropping undecodable cache entry {}: {}", key, e);
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cannot encode cache entry {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.put(key, raw, ttl).await {
            warn!("cache write failed for {}: {}", key, e);
        }
    }

    /// Store a database read unless an invalidation ran since `seen`
    async fn fill_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>, seen: u64) {
        if self.generation() != seen {
            debug!("skipping stale cache fill: {}", key);
            return;
        }
        self.put_json(key, value, ttl).await;

        // An invalidation may have landed while the write was in flight
        if self.generation() != seen {
            debug!("dropping raced cache fill: {}", key);
            self.delete(key).await;
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("cache delete failed for {}: {}", key, e);
        }
    }

    async fn delete_prefix(&self, prefix: &str) {
        match self.store.delete_prefix(prefix).await {
            Ok(n) => debug!("invalidated {} cache entries under {}", n, prefix),
            Err(e) => warn!("cache prefix delete failed for {}: {}", prefix, e),
        }
    }

    // Tokens: cached without TTL, removed on every token write

    pub async fn get_token(&self, token_hash: &str) -> Option<ApiTokenRecord> {
        self.get_json(&keys::token(token_hash)).await
    }

    pub async fn set_token(&self, token_hash: &str, record: &ApiTokenRecord, seen: u64) {
        self.fill_json(&keys::token(token_hash), record, None, seen).await
    }

    // Table metadata

    pub async fn get_table(&self, table_id: &str) -> Option<UserTable> {
        self.get_json(&keys::table(table_id)).await
    }

    pub async fn set_table(&self, table: &UserTable, seen: u64) {
        self.fill_json(&keys::table(&table.id), table, None, seen).await
    }

    pub async fn get_columns(&self, table_id: &str) -> Option<Vec<Column>> {
        self.get_json(&keys::columns(table_id)).await
    }

    pub async fn set_columns(&self, table_id: &str, columns: &[Column], seen: u64) {
        self.fill_json(&keys::columns(table_id), &columns, None, seen).await
    }

    pub async fn get_row_count(&self, table_id: &str) -> Option<i64> {
        self.get_json(&keys::row_count(table_id)).await
    }

    pub async fn set_row_count(&self, table_id: &str, count: i64, seen: u64) {
        self.fill_json(&keys::row_count(table_id), &count, None, seen).await
    }

    pub async fn get_item(&self, table_id: &str, item_id: &str) -> Option<DataRow> {
        self.get_json(&keys::item(table_id, item_id)).await
    }

    pub async fn set_item(&self, row: &DataRow, seen: u64) {
        self.fill_json(&keys::item(&row.table_id, &row.id), row, None, seen).await
    }

    // Access decisions (token x table)

    pub async fn get_access(&self, token_id: &str, table_id: &str) -> Option<bool> {
        self.get_json(&keys::access(token_id, table_id)).await
    }

    pub async fn set_access(&self, token_id: &str, table_id: &str, allowed: bool) {
        self.put_json(&keys::access(token_id, table_id), &allowed, None).await
    }

    // Short-lived query results

    pub async fn get_query(
        &self,
        table_ids: &[String],
        conditions: &BTreeMap<String, String>,
        limit: u32,
        offset: u32,
    ) -> Option<CachedQuery> {
        self.get_json(&keys::query(table_ids, conditions, limit, offset)).await
    }

    pub async fn set_query(
        &self,
        table_ids: &[String],
        conditions: &BTreeMap<String, String>,
        limit: u32,
        offset: u32,
        result: &CachedQuery,
    ) {
        let key = keys::query(table_ids, conditions, limit, offset);
        self.put_json(&key, result, Some(self.query_ttl)).await
    }

    pub async fn get_public_tables(&self) -> Option<Vec<PublicTable>> {
        self.get_json(keys::PUBLIC_TABLES).await
    }

    pub async fn set_public_tables(&self, tables: &[PublicTable]) {
        self.put_json(keys::PUBLIC_TABLES, &tables, Some(self.public_tables_ttl)).await
    }

    // Installed modules, read on every type resolution

    pub async fn get_modules(&self) -> Option<Vec<ModuleDefinition>> {
        self.get_json(keys::MODULES).await
    }

    pub async fn set_modules(&self, modules: &[ModuleDefinition], seen: u64) {
        self.fill_json(keys::MODULES, &modules, None, seen).await
    }

    // Invalidation helpers

    pub async fn invalidate_modules(&self) {
        self.bump_generation();
        self.delete(keys::MODULES).await;
    }

    /// Drop a token's lookup entry and every access decision made for it
    pub async fn invalidate_token(&self, token_hash: &str, token_id: &str) {
        self.bump_generation();
        self.delete(&keys::token(token_hash)).await;
        self.delete_prefix(&keys::access_token_prefix(token_id)).await;
    }

    /// Table metadata, columns, rows and access decisions for one table, plus
    /// the cross-table listings it may appear in
    pub async fn invalidate_table(&self, table_id: &str) {
        self.bump_generation();
        self.delete(&keys::table(table_id)).await;
        self.delete(&keys::columns(table_id)).await;
        self.invalidate_rows(table_id).await;

        let suffix = format!(":{}", table_id);
        match self.store.keys(keys::ACCESS_PREFIX).await {
            Ok(access_keys) => {
                for key in access_keys.iter().filter(|k| k.ends_with(&suffix)) {
                    self.delete(key).await;
                }
            }
            Err(e) => warn!("cannot list access decisions for {}: {}", table_id, e),
        }
    }

    /// Columns changed: drop the column list and anything shaped by it
    pub async fn invalidate_columns(&self, table_id: &str) {
        self.bump_generation();
        self.delete(&keys::columns(table_id)).await;
        self.delete_prefix(keys::QUERY_PREFIX).await;
        self.delete(keys::PUBLIC_TABLES).await;
    }

    /// Row data changed: counts, items, query pages and the public listing
    pub async fn invalidate_rows(&self, table_id: &str) {
        self.bump_generation();
        self.delete(&keys::row_count(table_id)).await;
        self.delete_prefix(&keys::items_prefix(table_id)).await;
        self.delete_prefix(keys::QUERY_PREFIX).await;
        self.delete(keys::PUBLIC_TABLES).await;
    }

    pub async fn invalidate_item(&self, table_id: &str, item_id: &str) {
        self.bump_generation();
        self.delete(&keys::item(table_id, item_id)).await;
        self.delete(&keys::row_count(table_id)).await;
        self.delete_prefix(keys::QUERY_PREFIX).await;
        self.delete(keys::PUBLIC_TABLES).await;
    }

    pub async fn invalidate_all(&self) {
        self.bump_generation();
        if let Err(e) = self.store.clear().await {
            warn!("cache clear failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> (CacheService, MemoryKvStore) {
        let store = MemoryKvStore::new();
        let cache = CacheService::new(Arc::new(store.clone()), &AppConfig::development().cache);
        (cache, store)
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let mut config = AppConfig::development().cache;
        config.enabled = false;
        let cache = CacheService::in_memory(&config);

        cache.set_row_count("t1", 5, cache.generation()).await;
        assert_eq!(cache.get_row_count("t1").await, None);
    }

    #[tokio::test]
    async fn undecodable_entries_are_dropped() {
        let (cache, store) = service();
        store.put("rowcount:t1", "not-a-number".into(), None).await.unwrap();

        assert_eq!(cache.get_row_count("t1").await, None);
        assert_eq!(store.get("rowcount:t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_table_removes_access_for_that_table_only() {
        let (cache, store) = service();
        cache.set_access("tok1", "t1", true).await;
        cache.set_access("tok2", "t1", false).await;
        cache.set_access("tok1", "t2", true).await;
        cache.set_row_count("t1", 3, cache.generation()).await;

        cache.invalidate_table("t1").await;

        assert_eq!(cache.get_access("tok1", "t1").await, None);
        assert_eq!(cache.get_access("tok2", "t1").await, None);
        assert_eq!(cache.get_access("tok1", "t2").await, Some(true));
        assert_eq!(cache.get_row_count("t1").await, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn invalidate_token_removes_lookup_and_decisions() {
        let (cache, _store) = service();
        cache.set_access("tok1", "t1", true).await;
        cache.set_access("tok2", "t1", true).await;

        cache.invalidate_token("hash", "tok1").await;

        assert_eq!(cache.get_access("tok1", "t1").await, None);
        assert_eq!(cache.get_access("tok2", "t1").await, Some(true));
    }

    #[tokio::test]
    async fn row_writes_drop_query_pages() {
        let (cache, _store) = service();
        let ids = vec!["t1".to_string()];
        let page = CachedQuery { records: vec![], total: 0 };
        cache.set_query(&ids, &BTreeMap::new(), 100, 0, &page).await;
        assert_eq!(cache.get_query(&ids, &BTreeMap::new(), 100, 0).await, Some(page));

        cache.invalidate_rows("t9").await;
        assert_eq!(cache.get_query(&ids, &BTreeMap::new(), 100, 0).await, None);
    }

    #[tokio::test]
    async fn fills_older_than_an_invalidation_are_dropped() {
        let (cache, store) = service();
        let seen = cache.generation();

        // A write lands between the database read and the fill
        cache.invalidate_item("t1", "r1").await;
        cache.set_row_count("t1", 7, seen).await;
        assert_eq!(cache.get_row_count("t1").await, None);
        assert_eq!(store.len().await, 0);

        cache.set_row_count("t1", 8, cache.generation()).await;
        assert_eq!(cache.get_row_count("t1").await, Some(8));
    }

    #[tokio::test]
    async fn clones_share_one_generation() {
        let (cache, _store) = service();
        let other = cache.clone();
        let seen = cache.generation();

        other.invalidate_token("hash", "tok1").await;
        assert_ne!(cache.generation(), seen);
    }
}
