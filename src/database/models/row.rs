use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Storage shape of `table_rows`; `data` is a JSON object serialized as text
#[derive(Debug, Clone, FromRow)]
pub struct DataRowRecord {
    pub id: String,
    pub table_id: String,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRow {
    pub id: String,
    pub table_id: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DataRowRecord> for DataRow {
    fn from(record: DataRowRecord) -> Self {
        // Rows written outside the API may hold anything; treat non-objects as empty
        let data = match serde_json::from_str::<Value>(&record.data) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Self {
            id: record.id,
            table_id: record.table_id,
            data,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
