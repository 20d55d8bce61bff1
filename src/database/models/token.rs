use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Storage shape of `api_tokens`. List-valued fields are JSON arrays in text
/// columns. This is also what the token cache holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApiTokenRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub permissions: String,
    pub table_access: Option<String>,
    pub allowed_ips: String,
    pub allowed_domains: String,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ApiTokenRecord {
    pub fn permission_names(&self) -> Vec<String> {
        parse_string_list(&self.permissions)
    }

    /// `None` when the column is NULL or holds JSON `null`
    pub fn table_access_ids(&self) -> Option<Vec<String>> {
        match self.table_access.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!("token {}: unreadable table access list: {}", self.id, e);
                Vec::new()
            })),
        }
    }

    pub fn ip_patterns(&self) -> Vec<String> {
        parse_string_list(&self.allowed_ips)
    }

    pub fn domain_patterns(&self) -> Vec<String> {
        parse_string_list(&self.allowed_domains)
    }
}

fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Token as returned by the API. The secret only appears once, on creation
/// and regeneration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTokenView {
    pub id: String,
    pub name: String,
    pub token_prefix: String,
    pub permissions: Vec<String>,
    pub table_access: Option<Vec<String>>,
    pub allowed_ips: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<&ApiTokenRecord> for ApiTokenView {
    fn from(record: &ApiTokenRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            token_prefix: record.token_prefix.clone(),
            permissions: record.permission_names(),
            table_access: record.table_access_ids(),
            allowed_ips: record.ip_patterns(),
            allowed_domains: record.domain_patterns(),
            expires_at: record.expires_at.clone(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToken {
    pub name: String,
    /// JSON array or a comma/space separated string
    #[serde(default)]
    pub permissions: Option<serde_json::Value>,
    #[serde(default)]
    pub table_access: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Partial token update. `tableAccess: null` clears the table list,
/// `expiresAt: null` removes the expiry; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUpdate {
    pub name: Option<String>,
    pub permissions: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    pub table_access: Option<Option<Vec<String>>>,
    pub allowed_ips: Option<Vec<String>>,
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub expires_at: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(table_access: Option<&str>) -> ApiTokenRecord {
        ApiTokenRecord {
            id: "tok".into(),
            user_id: "u".into(),
            name: "t".into(),
            token_hash: "h".into(),
            token_prefix: "dt_abc".into(),
            permissions: r#"["read","write"]"#.into(),
            table_access: table_access.map(String::from),
            allowed_ips: "[]".into(),
            allowed_domains: r#"["*.example.com"]"#.into(),
            expires_at: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn table_access_null_and_list() {
        assert_eq!(record(None).table_access_ids(), None);
        assert_eq!(record(Some("null")).table_access_ids(), None);
        assert_eq!(record(Some(r#"["a","b"]"#)).table_access_ids(), Some(vec!["a".into(), "b".into()]));
        assert_eq!(record(Some("not json")).table_access_ids(), Some(vec![]));
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: TokenUpdate = serde_json::from_str(r#"{"tableAccess": null}"#).unwrap();
        assert_eq!(update.table_access, Some(None));
        assert_eq!(update.expires_at, None);

        let update: TokenUpdate = serde_json::from_str(r#"{"expiresAt": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(update.expires_at, Some(Some("2030-01-01T00:00:00Z".into())));
    }

    #[test]
    fn view_hides_secret_and_parses_lists() {
        let view = ApiTokenView::from(&record(None));
        assert_eq!(view.permissions, vec!["read", "write"]);
        assert_eq!(view.allowed_domains, vec!["*.example.com"]);
        assert!(view.token.is_none());
    }
}
