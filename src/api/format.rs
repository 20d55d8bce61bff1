//! Wire shapes for rows on the public API.

use serde_json::{json, Value};

use crate::database::models::DataRow;

/// Keys every projected record keeps regardless of `columns=`
const IDENTITY_KEYS: [&str; 4] = ["id", "tableId", "tableName", "tableType"];

/// `{id, tableId, tableName, tableType, ...data, createdAt, updatedAt}`.
/// Data fields sit at the top level; record keys win over same-named data.
pub fn flatten_record(row: &DataRow, table_name: &str, table_type: &str) -> Value {
    let mut flat = row.data.clone();
    flat.insert("id".into(), Value::String(row.id.clone()));
    flat.insert("tableId".into(), Value::String(row.table_id.clone()));
    flat.insert("tableName".into(), Value::String(table_name.to_string()));
    flat.insert("tableType".into(), Value::String(table_type.to_string()));
    flat.insert("createdAt".into(), Value::String(row.created_at.clone()));
    flat.insert("updatedAt".into(), Value::String(row.updated_at.clone()));
    Value::Object(flat)
}

/// Nested item shape: `{id, data, createdAt, updatedAt}`
pub fn item_view(row: &DataRow) -> Value {
    json!({
        "id": row.id,
        "data": row.data,
        "createdAt": row.created_at,
        "updatedAt": row.updated_at,
    })
}

/// Keep the identity keys plus the requested columns
pub fn project_columns(record: Value, columns: &[String]) -> Value {
    match record {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| IDENTITY_KEYS.contains(&k.as_str()) || columns.iter().any(|c| c == k))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> DataRow {
        let data = json!({"price": 10, "color": "red", "id": "shadowed"});
        DataRow {
            id: "r1".into(),
            table_id: "t1".into(),
            data: data.as_object().cloned().unwrap(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-02T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn flattens_data_to_top_level() {
        let flat = flatten_record(&row(), "Shop", "sale");
        assert_eq!(flat["tableName"], "Shop");
        assert_eq!(flat["price"], 10);
        assert_eq!(flat["updatedAt"], "2024-01-02T00:00:00.000Z");
        assert_eq!(flat["id"], "r1");
    }

    #[test]
    fn projection_keeps_identity() {
        let projected = project_columns(flatten_record(&row(), "Shop", "sale"), &["price".to_string()]);
        let keys: Vec<&String> = projected.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(projected["price"], 10);
        assert!(projected.get("color").is_none());
        assert!(projected.get("createdAt").is_none());
    }

    #[test]
    fn item_view_nests_data() {
        let item = item_view(&row());
        assert_eq!(item["data"]["color"], "red");
        assert_eq!(item["id"], "r1");
    }
}
