/// Shared types used across the codebase

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Table flavour. `sale` and `rent` tables carry protected inventory columns
/// and are the only ones exposed through the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    #[default]
    Default,
    Sale,
    Rent,
}

impl TableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::Default => "default",
            TableType::Sale => "sale",
            TableType::Rent => "rent",
        }
    }

    pub fn is_inventory(&self) -> bool {
        matches!(self, TableType::Sale | TableType::Rent)
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "" => Ok(TableType::Default),
            "sale" => Ok(TableType::Sale),
            "rent" => Ok(TableType::Rent),
            other => Err(format!("Unknown table type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
    Shared,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
            Visibility::Shared => "shared",
        }
    }

    /// Public and shared tables are listed for unrestricted tokens
    pub fn is_listed(&self) -> bool {
        matches!(self, Visibility::Public | Visibility::Shared)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" | "" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            "shared" => Ok(Visibility::Shared),
            other => Err(format!("Unknown visibility '{}'", other)),
        }
    }
}

/// Current UTC time in the storage format (RFC 3339, millisecond precision)
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Column and filter identifiers: letter or underscore, then letters, digits, underscores
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_table_types() {
        assert_eq!("Sale".parse::<TableType>().unwrap(), TableType::Sale);
        assert_eq!("".parse::<TableType>().unwrap(), TableType::Default);
        assert!("lease".parse::<TableType>().is_err());
        assert!(TableType::Rent.is_inventory());
        assert!(!TableType::Default.is_inventory());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("price"));
        assert!(is_identifier("_internal2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("x') OR 1=1 --"));
        assert!(!is_identifier(""));
    }
}
