use std::collections::{BTreeMap, HashMap};

use super::error::FilterError;
use crate::types::is_identifier;

/// Equality filters over row JSON, given as `where[column]=value` query pairs
pub struct FilterWhere;

impl FilterWhere {
    /// Pull `where[...]` pairs out of a query map. Column names end up inside
    /// SQL JSON paths, so anything but a plain identifier is rejected.
    pub fn extract(query: &HashMap<String, String>) -> Result<BTreeMap<String, String>, FilterError> {
        let mut conditions = BTreeMap::new();
        for (key, value) in query {
            if let Some(column) = key.strip_prefix("where[").and_then(|s| s.strip_suffix(']')) {
                if !is_identifier(column) {
                    return Err(FilterError::InvalidColumn(column.to_string()));
                }
                conditions.insert(column.to_string(), value.clone());
            }
        }
        Ok(conditions)
    }

    /// Case-insensitive comparison of one JSON field against a bound string.
    /// JSON booleans compare as `true` / `false`.
    pub fn condition_sql(column: &str) -> String {
        format!(
            "LOWER(CASE json_type(data, '$.{col}') WHEN 'true' THEN 'true' WHEN 'false' THEN 'false' \
             ELSE json_extract(data, '$.{col}') END) = LOWER(?)",
            col = column
        )
    }

    /// `" AND <cond> AND <cond>"` plus bind values in the same order; empty
    /// when there are no conditions
    pub fn generate(conditions: &BTreeMap<String, String>) -> (String, Vec<String>) {
        let mut sql = String::new();
        let mut binds = Vec::with_capacity(conditions.len());
        for (column, value) in conditions {
            sql.push_str(" AND ");
            sql.push_str(&Self::condition_sql(column));
            binds.push(value.clone());
        }
        (sql, binds)
    }
}
