use serde_json::json;

use crate::database::models::NewColumn;
use crate::types::TableType;

/// Inventory columns every sale/rent table carries. Their definitions are
/// owned by the table type and cannot be edited or removed.
pub fn protected_columns(table_type: TableType) -> Vec<NewColumn> {
    match table_type {
        TableType::Default => Vec::new(),
        TableType::Sale => vec![
            NewColumn::new("price", "number").required().with_min(0.0),
            NewColumn::new("qty", "number").required().with_default(json!(0)).with_min(0.0),
        ],
        TableType::Rent => vec![
            NewColumn::new("price", "number").required().with_min(0.0),
            NewColumn::new("fee", "number").with_default(json!(0)).with_min(0.0),
            NewColumn::new("used", "boolean").with_default(json!(false)),
            NewColumn::new("available", "boolean").with_default(json!(true)),
        ],
    }
}

pub fn is_protected(table_type: TableType, column_name: &str) -> bool {
    protected_columns(table_type)
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(column_name))
}
