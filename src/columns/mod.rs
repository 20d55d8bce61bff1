//! Column type registry.
//!
//! Built-in types are fixed. Module types are referenced as
//! `@scope/module:type` and resolve only while their module is enabled; each
//! one narrows a built-in base type with an optional regex.

pub mod country;
pub mod protected;
pub mod validate;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::modules::ModuleDefinition;

pub use protected::{is_protected, protected_columns};
pub use validate::{check_definition, validate_row, validate_value, ValidateMode, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Text,
    Number,
    Date,
    Boolean,
    Email,
    Url,
    Country,
}

impl BaseType {
    pub const ALL: [BaseType; 7] = [
        BaseType::Text,
        BaseType::Number,
        BaseType::Date,
        BaseType::Boolean,
        BaseType::Email,
        BaseType::Url,
        BaseType::Country,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Text => "text",
            BaseType::Number => "number",
            BaseType::Date => "date",
            BaseType::Boolean => "boolean",
            BaseType::Email => "email",
            BaseType::Url => "url",
            BaseType::Country => "country",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            BaseType::Text => "Free text",
            BaseType::Number => "Integer or decimal number",
            BaseType::Date => "Calendar date (YYYY-MM-DD) or RFC 3339 timestamp",
            BaseType::Boolean => "true / false",
            BaseType::Email => "Email address",
            BaseType::Url => "http(s) URL",
            BaseType::Country => "ISO 3166-1 alpha-2 country code",
        }
    }

    /// Types whose normalised value is a JSON string
    pub fn is_textual(&self) -> bool {
        !matches!(self, BaseType::Number | BaseType::Boolean)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
    }
}

/// Parsed column type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef<'a> {
    Builtin(BaseType),
    Module { module_id: &'a str, type_name: &'a str },
}

impl<'a> TypeRef<'a> {
    pub fn parse(reference: &'a str) -> Result<Self, ValidationError> {
        let reference = reference.trim();
        if !reference.starts_with('@') {
            return reference.parse().map(TypeRef::Builtin);
        }

        match reference.rsplit_once(':') {
            Some((module_id, type_name)) if module_id.contains('/') && !type_name.is_empty() => {
                Ok(TypeRef::Module { module_id, type_name })
            }
            _ => Err(ValidationError::UnknownType(reference.to_string())),
        }
    }
}

/// A type reference resolved against the registry
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub reference: String,
    pub base: BaseType,
    pub pattern: Option<Regex>,
    pub module: Option<String>,
}

impl ResolvedType {
    pub fn builtin(base: BaseType) -> Self {
        Self {
            reference: base.as_str().to_string(),
            base,
            pattern: None,
            module: None,
        }
    }
}

/// Entry of `GET /api/column-types`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTypeInfo {
    pub id: String,
    pub name: String,
    pub base: BaseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
struct ModuleType {
    module_id: String,
    name: String,
    base: BaseType,
    pattern: Option<Regex>,
    description: Option<String>,
}

/// Snapshot of every resolvable column type
#[derive(Debug, Clone, Default)]
pub struct ColumnTypeRegistry {
    module_types: BTreeMap<String, ModuleType>,
}

impl ColumnTypeRegistry {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Registry over the built-ins plus the types of every enabled module
    pub fn from_modules(modules: &[ModuleDefinition]) -> Self {
        let mut module_types = BTreeMap::new();

        for module in modules.iter().filter(|m| m.enabled) {
            for column_type in &module.column_types {
                let pattern = match column_type.pattern.as_deref().map(Regex::new).transpose() {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        tracing::warn!("module {}: skipping type '{}': {}", module.id, column_type.name, e);
                        continue;
                    }
                };

                let reference = format!("{}:{}", module.id, column_type.name);
                module_types.insert(
                    reference,
                    ModuleType {
                        module_id: module.id.clone(),
                        name: column_type.name.clone(),
                        base: column_type.base,
                        pattern,
                        description: column_type.description.clone(),
                    },
                );
            }
        }

        Self { module_types }
    }

    pub fn resolve(&self, reference: &str) -> Result<ResolvedType, ValidationError> {
        match TypeRef::parse(reference)? {
            TypeRef::Builtin(base) => Ok(ResolvedType::builtin(base)),
            TypeRef::Module { .. } => {
                let module_type = self
                    .module_types
                    .get(reference.trim())
                    .ok_or_else(|| ValidationError::UnknownType(reference.to_string()))?;

                Ok(ResolvedType {
                    reference: reference.trim().to_string(),
                    base: module_type.base,
                    pattern: module_type.pattern.clone(),
                    module: Some(module_type.module_id.clone()),
                })
            }
        }
    }

    pub fn list(&self) -> Vec<ColumnTypeInfo> {
        let builtins = BaseType::ALL.into_iter().map(|base| ColumnTypeInfo {
            id: base.as_str().to_string(),
            name: base.as_str().to_string(),
            base,
            module: None,
            pattern: None,
            description: Some(base.description().to_string()),
        });

        let modules = self.module_types.iter().map(|(reference, t)| ColumnTypeInfo {
            id: reference.clone(),
            name: t.name.clone(),
            base: t.base,
            module: Some(t.module_id.clone()),
            pattern: t.pattern.as_ref().map(|p| p.as_str().to_string()),
            description: t.description.clone(),
        });

        builtins.chain(modules).collect()
    }
}
