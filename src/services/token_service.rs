use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use std::net::IpAddr;
use tracing::{debug, info, warn};

use super::{new_id, ServiceError, ServiceResult};
use crate::auth::whitelist::{domain_allowed, ip_allowed, parse_domain_rules, parse_ip_rules};
use crate::auth::{display_prefix, generate_token, hash_token, AuthToken, PermissionSet, TokenError};
use crate::cache::CacheService;
use crate::config::SecurityConfig;
use crate::database::models::{ApiTokenRecord, ApiTokenView, NewToken, TokenUpdate, UserTable};
use crate::types::now_timestamp;

const TOKEN_FIELDS: &str = "id, user_id, name, token_hash, token_prefix, permissions, table_access, \
     allowed_ips, allowed_domains, expires_at, created_at, updated_at";

pub struct TokenService {
    pool: SqlitePool,
    cache: CacheService,
    security: SecurityConfig,
}

impl TokenService {
    pub fn new(pool: SqlitePool, cache: CacheService, security: SecurityConfig) -> Self {
        Self { pool, cache, security }
    }

    /// Resolve a presented secret into the caller's identity. Expiry and both
    /// whitelists are checked on every call, whether the record came from the
    /// cache or the database.
    pub async fn authenticate(
        &self,
        secret: &str,
        ip: Option<IpAddr>,
        domain: Option<&str>,
    ) -> ServiceResult<AuthToken> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(TokenError::MissingToken.into());
        }

        let hash = hash_token(secret);
        let record = match self.cache.get_token(&hash).await {
            Some(record) => record,
            None => {
                let seen = self.cache.generation();
                let record = self
                    .find_by_hash(&hash)
                    .await?
                    .ok_or(TokenError::InvalidToken)?;
                self.cache.set_token(&hash, &record, seen).await;
                record
            }
        };

        if is_expired(&record, Utc::now()) {
            warn!("Rejected expired token {}", record.id);
            return Err(TokenError::Expired.into());
        }

        let ip_rules = parse_ip_rules(&record.ip_patterns()).unwrap_or_else(|e| {
            warn!("token {}: unreadable IP whitelist: {}", record.id, e);
            Vec::new()
        });
        if !ip_allowed(&ip_rules, ip) {
            warn!("Rejected token {} from IP {:?}", record.id, ip);
            return Err(TokenError::IpNotAllowed(ip).into());
        }

        let domain_rules = parse_domain_rules(&record.domain_patterns()).unwrap_or_else(|e| {
            warn!("token {}: unreadable domain whitelist: {}", record.id, e);
            Vec::new()
        });
        if !domain_allowed(&domain_rules, domain) {
            warn!("Rejected token {} from domain {:?}", record.id, domain);
            return Err(TokenError::DomainNotAllowed(domain.map(str::to_string)).into());
        }

        debug!("Authenticated token {} for user {}", record.id, record.user_id);
        Ok(AuthToken::from_record(&record, &self.security.unrestricted_token_ids))
    }

    pub async fn can_access_table(&self, token: &AuthToken, table: &UserTable) -> bool {
        table_access(&self.cache, token, table).await
    }

    async fn find_by_hash(&self, hash: &str) -> ServiceResult<Option<ApiTokenRecord>> {
        let record = sqlx::query_as::<_, ApiTokenRecord>(&format!(
            "SELECT {} FROM api_tokens WHERE token_hash = ?",
            TOKEN_FIELDS
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list(&self, user_id: &str) -> ServiceResult<Vec<ApiTokenView>> {
        let records = sqlx::query_as::<_, ApiTokenRecord>(&format!(
            "SELECT {} FROM api_tokens WHERE user_id = ? ORDER BY created_at, id",
            TOKEN_FIELDS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.iter().map(ApiTokenView::from).collect())
    }

    pub async fn get(&self, user_id: &str, token_id: &str) -> ServiceResult<ApiTokenRecord> {
        sqlx::query_as::<_, ApiTokenRecord>(&format!(
            "SELECT {} FROM api_tokens WHERE id = ? AND user_id = ?",
            TOKEN_FIELDS
        ))
        .bind(token_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Token", token_id))
    }

    /// Issue a token. The returned view is the only place the secret appears.
    pub async fn create(&self, user_id: &str, new: NewToken) -> ServiceResult<ApiTokenView> {
        self.create_with_id(&new_id(), user_id, new).await
    }

    /// Issue a token under a chosen id, e.g. one of the configured
    /// unrestricted service token ids
    pub async fn create_with_id(&self, id: &str, user_id: &str, new: NewToken) -> ServiceResult<ApiTokenView> {
        let name = validate_name(&new.name)?;
        let permissions = match &new.permissions {
            Some(value) => parse_permissions(value)?,
            None => PermissionSet::read_only(),
        };
        if let Some(ids) = &new.table_access {
            self.check_table_ids(user_id, ids).await?;
        }
        validate_whitelists(&new.allowed_ips, &new.allowed_domains)?;
        let expires_at = new.expires_at.as_deref().map(normalize_expiry).transpose()?;

        let secret = generate_token(&self.security.token_prefix);
        let now = now_timestamp();
        let record = ApiTokenRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name,
            token_hash: hash_token(&secret),
            token_prefix: display_prefix(&secret, &self.security.token_prefix),
            permissions: serde_json::to_string(&permissions.names())?,
            table_access: new.table_access.as_ref().map(serde_json::to_string).transpose()?,
            allowed_ips: serde_json::to_string(&new.allowed_ips)?,
            allowed_domains: serde_json::to_string(&new.allowed_domains)?,
            expires_at,
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO api_tokens ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TOKEN_FIELDS
        ))
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.name)
        .bind(&record.token_hash)
        .bind(&record.token_prefix)
        .bind(&record.permissions)
        .bind(&record.table_access)
        .bind(&record.allowed_ips)
        .bind(&record.allowed_domains)
        .bind(&record.expires_at)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;

        info!("Created token {} ({}) for user {}", record.id, record.token_prefix, user_id);
        let mut view = ApiTokenView::from(&record);
        view.token = Some(secret);
        Ok(view)
    }

    pub async fn update(&self, user_id: &str, token_id: &str, update: TokenUpdate) -> ServiceResult<ApiTokenView> {
        let mut record = self.get(user_id, token_id).await?;

        if let Some(name) = &update.name {
            record.name = validate_name(name)?;
        }
        if let Some(value) = &update.permissions {
            record.permissions = serde_json::to_string(&parse_permissions(value)?.names())?;
        }
        if let Some(table_access) = &update.table_access {
            if let Some(ids) = table_access {
                self.check_table_ids(user_id, ids).await?;
            }
            record.table_access = table_access.as_ref().map(serde_json::to_string).transpose()?;
        }
        let ips = update.allowed_ips.clone().unwrap_or_else(|| record.ip_patterns());
        let domains = update.allowed_domains.clone().unwrap_or_else(|| record.domain_patterns());
        validate_whitelists(&ips, &domains)?;
        record.allowed_ips = serde_json::to_string(&ips)?;
        record.allowed_domains = serde_json::to_string(&domains)?;
        if let Some(expires_at) = &update.expires_at {
            record.expires_at = expires_at.as_deref().map(normalize_expiry).transpose()?;
        }
        record.updated_at = now_timestamp();

        sqlx::query(
            "UPDATE api_tokens SET name = ?, permissions = ?, table_access = ?, allowed_ips = ?, \
             allowed_domains = ?, expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&record.name)
        .bind(&record.permissions)
        .bind(&record.table_access)
        .bind(&record.allowed_ips)
        .bind(&record.allowed_domains)
        .bind(&record.expires_at)
        .bind(&record.updated_at)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate_token(&record.token_hash, &record.id).await;
        info!("Updated token {}", record.id);
        Ok(ApiTokenView::from(&record))
    }

    pub async fn delete(&self, user_id: &str, token_id: &str) -> ServiceResult<()> {
        let record = self.get(user_id, token_id).await?;

        sqlx::query("DELETE FROM api_tokens WHERE id = ?")
            .bind(&record.id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_token(&record.token_hash, &record.id).await;
        info!("Deleted token {}", record.id);
        Ok(())
    }

    /// Replace the secret; the old one stops working immediately
    pub async fn regenerate(&self, user_id: &str, token_id: &str) -> ServiceResult<ApiTokenView> {
        let mut record = self.get(user_id, token_id).await?;
        let old_hash = record.token_hash.clone();

        let secret = generate_token(&self.security.token_prefix);
        record.token_hash = hash_token(&secret);
        record.token_prefix = display_prefix(&secret, &self.security.token_prefix);
        record.updated_at = now_timestamp();

        sqlx::query("UPDATE api_tokens SET token_hash = ?, token_prefix = ?, updated_at = ? WHERE id = ?")
            .bind(&record.token_hash)
            .bind(&record.token_prefix)
            .bind(&record.updated_at)
            .bind(&record.id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_token(&old_hash, &record.id).await;
        info!("Regenerated token {}", record.id);
        let mut view = ApiTokenView::from(&record);
        view.token = Some(secret);
        Ok(view)
    }

    /// Every id in a table list must name one of the user's tables
    async fn check_table_ids(&self, user_id: &str, ids: &[String]) -> ServiceResult<()> {
        for id in ids {
            let owned: Option<(String,)> = sqlx::query_as("SELECT id FROM user_tables WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            if owned.is_none() {
                return Err(ServiceError::BadRequest(format!("Unknown table in table access list: {}", id)));
            }
        }
        Ok(())
    }
}

/// Public API reachability of `table` for `token`, memoised per pair
pub(crate) async fn table_access(cache: &CacheService, token: &AuthToken, table: &UserTable) -> bool {
    if let Some(allowed) = cache.get_access(&token.id, &table.id).await {
        return allowed;
    }
    let allowed = token.can_read_public(table);
    cache.set_access(&token.id, &table.id, allowed).await;
    allowed
}

fn is_expired(record: &ApiTokenRecord, now: DateTime<Utc>) -> bool {
    match record.expires_at.as_deref() {
        None => false,
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => at.with_timezone(&Utc) <= now,
            Err(e) => {
                warn!("token {}: unreadable expiry '{}': {}", record.id, raw, e);
                true
            }
        },
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::BadRequest("Token name is required".to_string()));
    }
    Ok(name.to_string())
}

fn parse_permissions(value: &Value) -> ServiceResult<PermissionSet> {
    let permissions = PermissionSet::parse(value)?;
    if permissions.is_empty() {
        return Err(ServiceError::BadRequest("At least one permission is required".to_string()));
    }
    Ok(permissions)
}

fn validate_whitelists(ips: &[String], domains: &[String]) -> Result<(), TokenError> {
    parse_ip_rules(ips).map_err(TokenError::InvalidWhitelist)?;
    parse_domain_rules(domains).map_err(TokenError::InvalidWhitelist)?;
    Ok(())
}

/// Accept any RFC 3339 timestamp (or a bare date, meaning midnight UTC) and
/// store it in the canonical form
fn normalize_expiry(raw: &str) -> Result<String, TokenError> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|midnight| DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc))
        })
        .ok_or_else(|| TokenError::InvalidExpiry(raw.to_string()))?;
    Ok(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}
