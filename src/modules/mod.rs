//! JSON-only modules that contribute column types.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns::BaseType;
use crate::database::models::ModuleRecord;
use crate::types::is_identifier;

static MODULE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@[a-z0-9-]+/[a-z0-9-]+$").expect("module id regex"));

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Invalid module id '{0}': expected @scope/name")]
    InvalidId(String),

    #[error("Invalid module definition: {0}")]
    InvalidDefinition(String),

    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Module already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Module {id} is used by columns: {}", .columns.join(", "))]
    InUse { id: String, columns: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleColumnType {
    pub name: String,
    pub base: BaseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body stored in `modules.definition`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDefinition {
    #[serde(default)]
    column_types: Vec<ModuleColumnType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub column_types: Vec<ModuleColumnType>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl ModuleDefinition {
    pub fn from_record(record: ModuleRecord) -> Result<Self, ModuleError> {
        let stored: StoredDefinition = serde_json::from_str(&record.definition)
            .map_err(|e| ModuleError::InvalidDefinition(format!("{}: {}", record.id, e)))?;

        Ok(Self {
            id: record.id,
            name: record.name,
            version: record.version,
            description: record.description,
            enabled: record.enabled != 0,
            column_types: stored.column_types,
        })
    }

    /// JSON written to `modules.definition`
    pub fn definition_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StoredDefinition {
            column_types: self.column_types.clone(),
        })
    }

    /// Type references this module contributes, e.g. `@store/phone-numbers:phone`
    pub fn type_references(&self) -> Vec<String> {
        self.column_types
            .iter()
            .map(|t| format!("{}:{}", self.id, t.name))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ModuleError> {
        validate_module_id(&self.id)?;

        if self.name.trim().is_empty() {
            return Err(ModuleError::InvalidDefinition("name is required".to_string()));
        }
        if self.column_types.is_empty() {
            return Err(ModuleError::InvalidDefinition("at least one column type is required".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for column_type in &self.column_types {
            if !is_identifier(&column_type.name) {
                return Err(ModuleError::InvalidDefinition(format!(
                    "'{}' is not a valid type name",
                    column_type.name
                )));
            }
            if !seen.insert(column_type.name.to_ascii_lowercase()) {
                return Err(ModuleError::InvalidDefinition(format!(
                    "duplicate type name '{}'",
                    column_type.name
                )));
            }
            if let Some(pattern) = &column_type.pattern {
                Regex::new(pattern).map_err(|e| {
                    ModuleError::InvalidDefinition(format!("type '{}': invalid pattern: {}", column_type.name, e))
                })?;
            }
        }

        Ok(())
    }
}

pub fn validate_module_id(id: &str) -> Result<(), ModuleError> {
    if MODULE_ID.is_match(id) {
        Ok(())
    } else {
        Err(ModuleError::InvalidId(id.to_string()))
    }
}
