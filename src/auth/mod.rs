pub mod whitelist;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::database::models::{ApiTokenRecord, UserTable};

const SECRET_LENGTH: usize = 32;
/// Characters of the secret kept after the prefix for display
const DISPLAY_CHARS: usize = 6;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Missing API token")]
    MissingToken,
    #[error("Invalid API token")]
    InvalidToken,
    #[error("API token has expired")]
    Expired,
    #[error("Request IP {} is not allowed for this token", .0.map(|ip| ip.to_string()).unwrap_or_else(|| "(unknown)".to_string()))]
    IpNotAllowed(Option<IpAddr>),
    #[error("Request domain {} is not allowed for this token", .0.as_deref().unwrap_or("(none)"))]
    DomainNotAllowed(Option<String>),
    #[error("Token lacks '{0}' permission")]
    InsufficientPermission(Permission),
    #[error("Unknown permission '{0}'")]
    InvalidPermission(String),
    #[error("Invalid whitelist entry: {0}")]
    InvalidWhitelist(String),
    #[error("Invalid expiry timestamp '{0}'")]
    InvalidExpiry(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 4] = [Permission::Read, Permission::Write, Permission::Delete, Permission::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "delete" => Ok(Permission::Delete),
            "admin" => Ok(Permission::Admin),
            other => Err(TokenError::InvalidPermission(other.to_string())),
        }
    }
}

/// Set of granted permissions. `admin` implies every other permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn read_only() -> Self {
        Self([Permission::Read].into_iter().collect())
    }

    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.0.contains(&Permission::Admin) || self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }

    /// Strict parse for client input. Accepts a JSON array of strings or a
    /// single comma/space separated string; `*` grants everything.
    pub fn parse(input: &Value) -> Result<Self, TokenError> {
        let items: Vec<String> = match input {
            Value::Array(values) => values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| TokenError::InvalidPermission(v.to_string()))
                })
                .collect::<Result<_, _>>()?,
            Value::String(s) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            other => return Err(TokenError::InvalidPermission(other.to_string())),
        };

        let mut set = BTreeSet::new();
        for item in items {
            if item.trim() == "*" {
                return Ok(Self::all());
            }
            set.insert(item.parse()?);
        }
        Ok(Self(set))
    }

    /// Lenient parse for stored values: unknown names are skipped with a warning
    pub fn from_stored(token_id: &str, names: &[String]) -> Self {
        let mut set = BTreeSet::new();
        for name in names {
            if name.trim() == "*" {
                return Self::all();
            }
            match name.parse() {
                Ok(p) => {
                    set.insert(p);
                }
                Err(_) => tracing::warn!("token {}: ignoring unknown permission '{}'", token_id, name),
            }
        }
        Self(set)
    }
}

/// Fresh plaintext secret: `<prefix>` followed by 32 alphanumerics
pub fn generate_token(prefix: &str) -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, secret)
}

/// SHA-256 of the plaintext token, lower hex. Only this is persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Recognisable leading part of a token, safe to show in listings
pub fn display_prefix(token: &str, prefix: &str) -> String {
    token.chars().take(prefix.chars().count() + DISPLAY_CHARS).collect()
}

/// Caller identity resolved from a validated token, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub permissions: PermissionSet,
    pub table_access: Option<Vec<String>>,
    /// Service tokens listed in config bypass table scoping entirely
    pub unrestricted: bool,
}

impl AuthToken {
    pub fn from_record(record: &ApiTokenRecord, unrestricted_ids: &[String]) -> Self {
        Self {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            name: record.name.clone(),
            permissions: PermissionSet::from_stored(&record.id, &record.permission_names()),
            table_access: record.table_access_ids(),
            unrestricted: unrestricted_ids.iter().any(|id| *id == record.id),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.has(permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), TokenError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(TokenError::InsufficientPermission(permission))
        }
    }

    /// Listed in `security.unrestricted_token_ids`, or carries `admin`.
    /// Such tokens ignore their table list.
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted || self.has(Permission::Admin)
    }

    /// Table ids reachable through the public API. `None` means unrestricted
    /// (every public or shared table); an empty list means nothing.
    pub fn allowed_table_ids(&self) -> Option<Vec<String>> {
        if self.is_unrestricted() {
            return None;
        }
        Some(self.table_access.clone().unwrap_or_default())
    }

    /// Public API reachability of one table
    pub fn can_read_public(&self, table: &UserTable) -> bool {
        match self.allowed_table_ids() {
            None => table.visibility.is_listed(),
            Some(ids) => ids.contains(&table.id),
        }
    }

    /// Admin API reachability: the caller's own tables, narrowed by the
    /// token's table list when one is set
    pub fn can_manage(&self, table: &UserTable) -> bool {
        if table.user_id != self.user_id {
            return false;
        }
        self.is_unrestricted() || self.table_access.as_ref().map_or(true, |ids| ids.contains(&table.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TableType, Visibility};
    use serde_json::json;

    fn token(permissions: &[Permission], table_access: Option<Vec<&str>>) -> AuthToken {
        AuthToken {
            id: "tok".into(),
            user_id: "owner".into(),
            name: "test".into(),
            permissions: PermissionSet(permissions.iter().copied().collect()),
            table_access: table_access.map(|ids| ids.into_iter().map(String::from).collect()),
            unrestricted: false,
        }
    }

    fn table(id: &str, owner: &str, visibility: Visibility) -> UserTable {
        UserTable {
            id: id.into(),
            user_id: owner.into(),
            name: id.into(),
            description: None,
            table_type: TableType::Sale,
            visibility,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn parses_permission_lists() {
        let set = PermissionSet::parse(&json!(["read", "WRITE"])).unwrap();
        assert!(set.has(Permission::Read));
        assert!(set.has(Permission::Write));
        assert!(!set.has(Permission::Delete));

        let set = PermissionSet::parse(&json!("read, delete")).unwrap();
        assert_eq!(set.names(), vec!["read", "delete"]);

        assert_eq!(PermissionSet::parse(&json!("*")).unwrap(), PermissionSet::all());
        assert!(matches!(
            PermissionSet::parse(&json!(["read", "fly"])),
            Err(TokenError::InvalidPermission(p)) if p == "fly"
        ));
        assert!(PermissionSet::parse(&json!(42)).is_err());
    }

    #[test]
    fn admin_implies_everything() {
        let set = PermissionSet::parse(&json!(["admin"])).unwrap();
        for p in Permission::ALL {
            assert!(set.has(p));
        }
    }

    #[test]
    fn stored_permissions_skip_unknown_names() {
        let set = PermissionSet::from_stored("tok", &["read".into(), "legacy".into()]);
        assert_eq!(set, PermissionSet::read_only());
    }

    #[test]
    fn token_generation_and_hashing() {
        let a = generate_token("dt_");
        let b = generate_token("dt_");
        assert!(a.starts_with("dt_"));
        assert_eq!(a.len(), 3 + SECRET_LENGTH);
        assert_ne!(a, b);

        assert_eq!(hash_token("abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(display_prefix("dt_abcdefghij", "dt_"), "dt_abcdef");
    }

    #[test]
    fn public_scope_rules() {
        let public = table("t1", "someone", Visibility::Public);
        let private = table("t2", "someone", Visibility::Private);

        let scoped = token(&[Permission::Read], Some(vec!["t2"]));
        assert_eq!(scoped.allowed_table_ids(), Some(vec!["t2".to_string()]));
        assert!(!scoped.can_read_public(&public));
        assert!(scoped.can_read_public(&private));

        let unscoped = token(&[Permission::Read], None);
        assert_eq!(unscoped.allowed_table_ids(), Some(vec![]));
        assert!(!unscoped.can_read_public(&public));

        let admin = token(&[Permission::Admin], None);
        assert_eq!(admin.allowed_table_ids(), None);
        assert!(admin.can_read_public(&public));
        assert!(!admin.can_read_public(&private));

        let mut service = token(&[Permission::Read], Some(vec![]));
        service.unrestricted = true;
        assert_eq!(service.allowed_table_ids(), None);
    }

    #[test]
    fn manage_scope_requires_ownership() {
        let own = table("t1", "owner", Visibility::Private);
        let other = table("t2", "someone", Visibility::Public);

        let t = token(&[Permission::Write], None);
        assert!(t.can_manage(&own));
        assert!(!t.can_manage(&other));

        let narrowed = token(&[Permission::Write], Some(vec!["t9"]));
        assert!(!narrowed.can_manage(&own));
    }

    #[test]
    fn admin_tokens_ignore_their_table_list() {
        let own = table("t2", "owner", Visibility::Public);
        let admin = token(&[Permission::Admin], Some(vec!["t1"]));

        assert!(admin.is_unrestricted());
        assert_eq!(admin.allowed_table_ids(), None);
        assert!(admin.can_read_public(&own));
        assert!(admin.can_manage(&own));
    }

    #[test]
    fn require_reports_missing_permission() {
        let t = token(&[Permission::Read], None);
        assert!(t.require(Permission::Read).is_ok());
        assert!(matches!(
            t.require(Permission::Delete),
            Err(TokenError::InsufficientPermission(Permission::Delete))
        ));
    }
}
