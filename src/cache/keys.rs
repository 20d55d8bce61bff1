//! Cache key namespaces. Every key the service writes is built here so the
//! invalidation helpers and the readers always agree on the layout.

use std::collections::BTreeMap;

pub const PUBLIC_TABLES: &str = "public:tables:all";
pub const QUERY_PREFIX: &str = "query:";
pub const ACCESS_PREFIX: &str = "access:";
pub const MODULES: &str = "modules:all";

pub fn token(token_hash: &str) -> String {
    format!("auth:token:{}", token_hash)
}

pub fn table(table_id: &str) -> String {
    format!("table:{}", table_id)
}

pub fn columns(table_id: &str) -> String {
    format!("columns:{}", table_id)
}

pub fn row_count(table_id: &str) -> String {
    format!("rowcount:{}", table_id)
}

pub fn item(table_id: &str, item_id: &str) -> String {
    format!("item:{}:{}", table_id, item_id)
}

pub fn items_prefix(table_id: &str) -> String {
    format!("item:{}:", table_id)
}

pub fn access(token_id: &str, table_id: &str) -> String {
    format!("{}{}:{}", ACCESS_PREFIX, token_id, table_id)
}

pub fn access_token_prefix(token_id: &str) -> String {
    format!("{}{}:", ACCESS_PREFIX, token_id)
}

/// `query:<tables>:<where>:<limit>:<offset>` where `<tables>` hashes the
/// comma-joined table ids and `<where>` hashes the sorted `k=v` pairs (or is
/// `none` without conditions).
pub fn query(table_ids: &[String], conditions: &BTreeMap<String, String>, limit: u32, offset: u32) -> String {
    let table_hash = short_hash(&table_ids.join(","));
    let where_hash = if conditions.is_empty() {
        "none".to_string()
    } else {
        let parts: Vec<String> = conditions.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        short_hash(&parts.join("&"))
    };
    format!("{}{}:{}:{}:{}", QUERY_PREFIX, table_hash, where_hash, limit, offset)
}

/// DJB2 over the bytes of `s`
pub fn djb2_hash(s: &str) -> u32 {
    let mut hash: u32 = 5381;
    for c in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(c as u32);
    }
    hash
}

pub fn short_hash(s: &str) -> String {
    format!("{:x}", djb2_hash(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn djb2_known_values() {
        assert_eq!(djb2_hash(""), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(djb2_hash("a"), 177_670);
        assert_eq!(short_hash("a"), "2b606");
    }

    #[test]
    fn query_key_is_order_independent_for_conditions() {
        let tables = vec!["t1".to_string(), "t2".to_string()];
        let mut a = BTreeMap::new();
        a.insert("color".to_string(), "red".to_string());
        a.insert("size".to_string(), "m".to_string());

        let mut b = BTreeMap::new();
        b.insert("size".to_string(), "m".to_string());
        b.insert("color".to_string(), "red".to_string());

        assert_eq!(query(&tables, &a, 100, 0), query(&tables, &b, 100, 0));
        assert_ne!(query(&tables, &a, 100, 0), query(&tables, &a, 100, 100));
        assert!(query(&tables, &BTreeMap::new(), 10, 0).contains(":none:10:0"));
    }

    #[test]
    fn namespaces() {
        assert_eq!(token("abc"), "auth:token:abc");
        assert_eq!(access("tok", "tbl"), "access:tok:tbl");
        assert!(access("tok", "tbl").starts_with(&access_token_prefix("tok")));
        assert!(item("t", "i").starts_with(&items_prefix("t")));
    }
}
