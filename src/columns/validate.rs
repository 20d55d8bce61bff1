use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use super::{country, BaseType, ColumnTypeRegistry, ResolvedType};
use crate::database::models::{Column, ColumnValidation, NewColumn};
use crate::types::is_identifier;

/// Keys that flattened and exported records use for the row itself
pub const RESERVED_COLUMN_NAMES: [&str; 6] = ["id", "tableId", "tableName", "tableType", "createdAt", "updatedAt"];

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Validation failed")]
    Fields(BTreeMap<String, String>),

    #[error("Unknown column type '{0}'")]
    UnknownType(String),

    #[error("Invalid column definition: {0}")]
    InvalidColumn(String),
}

impl ValidationError {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.to_string(), message.into());
        ValidationError::Fields(fields)
    }
}

/// `Create` applies defaults and required checks to the whole row; `Update`
/// only checks the keys present in the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    Create,
    Update,
}

/// Validate and normalise one non-null value
pub fn validate_value(
    resolved: &ResolvedType,
    rules: Option<&ColumnValidation>,
    value: &Value,
) -> Result<Value, String> {
    let normalised = match resolved.base {
        BaseType::Text => Value::String(expect_string(value)?.to_string()),
        BaseType::Number => normalise_number(value)?,
        BaseType::Boolean => Value::Bool(normalise_bool(value)?),
        BaseType::Date => {
            let s = expect_string(value)?.trim();
            let valid = NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok();
            if !valid {
                return Err("must be a date (YYYY-MM-DD) or RFC 3339 timestamp".to_string());
            }
            Value::String(s.to_string())
        }
        BaseType::Email => {
            let s = expect_string(value)?.trim();
            if !EMAIL.is_match(s) {
                return Err("must be a valid email address".to_string());
            }
            Value::String(s.to_string())
        }
        BaseType::Url => {
            let s = expect_string(value)?.trim();
            match url::Url::parse(s) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Value::String(s.to_string()),
                _ => return Err("must be a valid http(s) URL".to_string()),
            }
        }
        BaseType::Country => {
            let code = expect_string(value)?.trim().to_ascii_uppercase();
            if !country::is_valid_code(&code) {
                return Err("must be an ISO 3166-1 alpha-2 country code".to_string());
            }
            Value::String(code)
        }
    };

    if let Some(rules) = rules {
        apply_rules(resolved.base, rules, &normalised)?;
    }

    if let (Some(pattern), Value::String(s)) = (&resolved.pattern, &normalised) {
        if !pattern.is_match(s) {
            return Err(format!("is not a valid {}", resolved.reference));
        }
    }

    Ok(normalised)
}

fn expect_string(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "must be a string".to_string())
}

fn normalise_number(value: &Value) -> Result<Value, String> {
    let n = match value {
        Value::Number(n) => return Ok(Value::Number(n.clone())),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| "must be a number".to_string())?,
        _ => return Err("must be a number".to_string()),
    };

    if !n.is_finite() {
        return Err("must be a finite number".to_string());
    }
    // Whole numbers stay integers so quantities round-trip as i64
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number).ok_or_else(|| "must be a number".to_string())
}

fn normalise_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err("must be a boolean".to_string()),
        },
        _ => Err("must be a boolean".to_string()),
    }
}

fn apply_rules(base: BaseType, rules: &ColumnValidation, value: &Value) -> Result<(), String> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or_default();
            if let Some(min) = rules.min {
                if n < min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = rules.max {
                if n > max {
                    return Err(format!("must be at most {}", max));
                }
            }
        }
        Value::String(s) if base.is_textual() => {
            let len = s.chars().count() as f64;
            if let Some(min) = rules.min {
                if len < min {
                    return Err(format!("must be at least {} characters", min));
                }
            }
            if let Some(max) = rules.max {
                if len > max {
                    return Err(format!("must be at most {} characters", max));
                }
            }
            if let Some(options) = &rules.options {
                if !options.iter().any(|o| o == s) {
                    return Err(format!("must be one of: {}", options.join(", ")));
                }
            }
            if let Some(pattern) = &rules.pattern {
                let re = Regex::new(pattern).map_err(|_| "has an invalid validation pattern".to_string())?;
                if !re.is_match(s) {
                    return Err(format!("does not match pattern {}", pattern));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate a row against the table's columns and return the normalised data.
/// Every problem is collected so the client sees all failing fields at once.
pub fn validate_row(
    columns: &[Column],
    registry: &ColumnTypeRegistry,
    input: &Value,
    mode: ValidateMode,
) -> Result<Map<String, Value>, ValidationError> {
    let input = input
        .as_object()
        .ok_or_else(|| ValidationError::field("_row", "Row data must be a JSON object"))?;

    let mut errors = BTreeMap::new();
    let mut output = Map::new();

    for key in input.keys() {
        if !columns.iter().any(|c| c.name == *key) {
            errors.insert(key.clone(), "Unknown column".to_string());
        }
    }

    for column in columns {
        let resolved = match registry.resolve(&column.column_type) {
            Ok(resolved) => resolved,
            Err(e) => {
                errors.insert(column.name.clone(), e.to_string());
                continue;
            }
        };

        match input.get(&column.name) {
            Some(value) if !value.is_null() => match validate_value(&resolved, column.validation.as_ref(), value) {
                Ok(v) => {
                    output.insert(column.name.clone(), v);
                }
                Err(message) => {
                    errors.insert(column.name.clone(), message);
                }
            },
            present => {
                let explicit_null = present.is_some();
                match mode {
                    ValidateMode::Create => {
                        if let Some(default) = &column.default_value {
                            output.insert(column.name.clone(), default.clone());
                        } else if column.is_required {
                            errors.insert(column.name.clone(), "is required".to_string());
                        }
                    }
                    ValidateMode::Update if explicit_null => {
                        if column.is_required {
                            errors.insert(column.name.clone(), "is required".to_string());
                        } else {
                            output.insert(column.name.clone(), Value::Null);
                        }
                    }
                    ValidateMode::Update => {}
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(ValidationError::Fields(errors))
    }
}

/// Check a column definition before it is stored: identifier name, known
/// type, sane rules and a default that satisfies them. Returns the default in
/// normalised form.
pub fn check_definition(column: &NewColumn, registry: &ColumnTypeRegistry) -> Result<Option<Value>, ValidationError> {
    if !is_identifier(&column.name) {
        return Err(ValidationError::InvalidColumn(format!(
            "'{}' is not a valid column name (letters, digits and underscores, not starting with a digit)",
            column.name
        )));
    }
    if RESERVED_COLUMN_NAMES.iter().any(|r| r.eq_ignore_ascii_case(&column.name)) {
        return Err(ValidationError::InvalidColumn(format!(
            "'{}' is reserved for record metadata",
            column.name
        )));
    }

    let resolved = registry.resolve(&column.column_type)?;

    if let Some(rules) = &column.validation {
        if let (Some(min), Some(max)) = (rules.min, rules.max) {
            if min > max {
                return Err(ValidationError::InvalidColumn(format!(
                    "column '{}': min {} is greater than max {}",
                    column.name, min, max
                )));
            }
        }
        if let Some(pattern) = &rules.pattern {
            Regex::new(pattern).map_err(|e| {
                ValidationError::InvalidColumn(format!("column '{}': invalid pattern: {}", column.name, e))
            })?;
        }
    }

    match &column.default_value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => validate_value(&resolved, column.validation.as_ref(), value)
            .map(Some)
            .map_err(|message| ValidationError::field(&column.name, format!("default value {}", message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, column_type: &str, required: bool) -> Column {
        Column {
            id: format!("col-{}", name),
            table_id: "t1".into(),
            name: name.into(),
            column_type: column_type.into(),
            is_required: required,
            default_value: None,
            validation: None,
            position: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn builtin(base: BaseType) -> ResolvedType {
        ResolvedType::builtin(base)
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let r = builtin(BaseType::Number);
        assert_eq!(validate_value(&r, None, &json!("12")).unwrap(), json!(12));
        assert_eq!(validate_value(&r, None, &json!(" 9.5 ")).unwrap(), json!(9.5));
        assert_eq!(validate_value(&r, None, &json!(3)).unwrap(), json!(3));
        assert!(validate_value(&r, None, &json!("abc")).is_err());
        assert!(validate_value(&r, None, &json!(true)).is_err());

        let rules = ColumnValidation {
            min: Some(0.0),
            max: Some(10.0),
            ..Default::default()
        };
        assert!(validate_value(&r, Some(&rules), &json!(-1)).is_err());
        assert!(validate_value(&r, Some(&rules), &json!(11)).is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        let r = builtin(BaseType::Boolean);
        for (input, expected) in [
            (json!(true), true),
            (json!("YES"), true),
            (json!("1"), true),
            (json!(0), false),
            (json!("no"), false),
        ] {
            assert_eq!(validate_value(&r, None, &input).unwrap(), json!(expected));
        }
        assert!(validate_value(&r, None, &json!("maybe")).is_err());
    }

    #[test]
    fn textual_types() {
        assert!(validate_value(&builtin(BaseType::Date), None, &json!("2024-02-29")).is_ok());
        assert!(validate_value(&builtin(BaseType::Date), None, &json!("2024-02-30")).is_err());
        assert!(validate_value(&builtin(BaseType::Date), None, &json!("2024-01-01T10:00:00Z")).is_ok());

        assert!(validate_value(&builtin(BaseType::Email), None, &json!("a@b.io")).is_ok());
        assert!(validate_value(&builtin(BaseType::Email), None, &json!("a@b")).is_err());

        assert!(validate_value(&builtin(BaseType::Url), None, &json!("https://x.dev/p")).is_ok());
        assert!(validate_value(&builtin(BaseType::Url), None, &json!("ftp://x.dev")).is_err());

        assert_eq!(
            validate_value(&builtin(BaseType::Country), None, &json!("de")).unwrap(),
            json!("DE")
        );
        assert!(validate_value(&builtin(BaseType::Country), None, &json!("XX")).is_err());
    }

    #[test]
    fn text_rules() {
        let rules = ColumnValidation {
            min: Some(2.0),
            max: Some(5.0),
            options: Some(vec!["red".into(), "green".into(), "x".into()]),
            ..Default::default()
        };
        let r = builtin(BaseType::Text);
        assert!(validate_value(&r, Some(&rules), &json!("red")).is_ok());
        assert!(validate_value(&r, Some(&rules), &json!("blue")).is_err());
        assert!(validate_value(&r, Some(&rules), &json!("x")).is_err());
        assert!(validate_value(&r, Some(&rules), &json!(5)).is_err());
    }

    #[test]
    fn create_applies_defaults_and_required() {
        let mut qty = column("qty", "number", true);
        qty.default_value = Some(json!(0));
        let columns = vec![column("price", "number", true), qty, column("note", "text", false)];
        let registry = ColumnTypeRegistry::builtin();

        let row = validate_row(&columns, &registry, &json!({"price": "10"}), ValidateMode::Create).unwrap();
        assert_eq!(row.get("price"), Some(&json!(10)));
        assert_eq!(row.get("qty"), Some(&json!(0)));
        assert!(!row.contains_key("note"));

        let err = validate_row(&columns, &registry, &json!({"extra": 1}), ValidateMode::Create).unwrap_err();
        match err {
            ValidationError::Fields(fields) => {
                assert_eq!(fields.get("price").map(String::as_str), Some("is required"));
                assert_eq!(fields.get("extra").map(String::as_str), Some("Unknown column"));
                assert!(!fields.contains_key("qty"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn update_checks_only_present_fields() {
        let columns = vec![column("price", "number", true), column("note", "text", false)];
        let registry = ColumnTypeRegistry::builtin();

        let patch = validate_row(&columns, &registry, &json!({"note": null}), ValidateMode::Update).unwrap();
        assert_eq!(patch.get("note"), Some(&Value::Null));
        assert!(!patch.contains_key("price"));

        assert!(validate_row(&columns, &registry, &json!({"price": null}), ValidateMode::Update).is_err());
        assert!(validate_row(&columns, &registry, &json!([1, 2]), ValidateMode::Update).is_err());
    }

    #[test]
    fn definitions_are_checked() {
        let registry = ColumnTypeRegistry::builtin();
        assert!(check_definition(&NewColumn::new("2bad", "text"), &registry).is_err());
        assert!(matches!(
            check_definition(&NewColumn::new("ok", "money"), &registry),
            Err(ValidationError::UnknownType(_))
        ));

        let with_default = NewColumn::new("qty", "number").with_min(0.0).with_default(json!("-1"));
        assert!(check_definition(&with_default, &registry).is_err());

        let with_default = NewColumn::new("qty", "number").with_min(0.0).with_default(json!("4"));
        assert_eq!(check_definition(&with_default, &registry).unwrap(), Some(json!(4)));
    }

    #[test]
    fn record_metadata_names_are_reserved() {
        let registry = ColumnTypeRegistry::builtin();
        for name in ["id", "ID", "tableId", "tableName", "tableType", "createdAt", "updatedat"] {
            assert!(
                matches!(
                    check_definition(&NewColumn::new(name, "text"), &registry),
                    Err(ValidationError::InvalidColumn(_))
                ),
                "{}",
                name
            );
        }
        assert!(check_definition(&NewColumn::new("sku_id", "text"), &registry).is_ok());
    }
}
