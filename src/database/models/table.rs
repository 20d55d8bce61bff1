use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{TableType, Visibility};

/// Storage shape of `user_tables`
#[derive(Debug, Clone, FromRow)]
pub struct UserTableRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub table_type: String,
    pub visibility: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A user-defined table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTable {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub table_type: TableType,
    pub visibility: Visibility,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserTableRecord> for UserTable {
    fn from(record: UserTableRecord) -> Self {
        let table_type = record.table_type.parse().unwrap_or_else(|e| {
            tracing::warn!("table {}: {}; treating as default", record.id, e);
            TableType::Default
        });
        let visibility = record.visibility.parse().unwrap_or_else(|e| {
            tracing::warn!("table {}: {}; treating as private", record.id, e);
            Visibility::Private
        });

        Self {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            description: record.description,
            table_type,
            visibility,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTable {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub table_type: TableType,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub table_type: Option<TableType>,
    pub visibility: Option<Visibility>,
}

/// Public listing entry for sale/rent tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicTable {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub table_type: String,
    pub row_count: i64,
}
