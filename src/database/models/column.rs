use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Storage shape of `table_columns`
#[derive(Debug, Clone, FromRow)]
pub struct ColumnRecord {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub column_type: String,
    pub is_required: i64,
    pub default_value: Option<String>,
    pub validation: Option<String>,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-column validation rules. `min`/`max` bound numbers by value and
/// text by character count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub column_type: String,
    pub is_required: bool,
    pub default_value: Option<Value>,
    pub validation: Option<ColumnValidation>,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ColumnRecord> for Column {
    fn from(record: ColumnRecord) -> Self {
        let default_value = record
            .default_value
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        let validation = record
            .validation
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: record.id,
            table_id: record.table_id,
            name: record.name,
            column_type: record.column_type,
            is_required: record.is_required != 0,
            default_value,
            validation,
            position: record.position,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Column definition as submitted by clients (and used for protected columns)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub name: String,
    #[serde(alias = "type")]
    pub column_type: String,
    #[serde(default, alias = "required")]
    pub is_required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub validation: Option<ColumnValidation>,
    #[serde(default)]
    pub position: Option<i64>,
}

impl NewColumn {
    pub fn new(name: &str, column_type: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: column_type.to_string(),
            is_required: false,
            default_value: None,
            validation: None,
            position: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.validation.get_or_insert_with(ColumnValidation::default).min = Some(min);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdate {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub column_type: Option<String>,
    #[serde(alias = "required")]
    pub is_required: Option<bool>,
    pub default_value: Option<Value>,
    pub validation: Option<ColumnValidation>,
    pub position: Option<i64>,
}
