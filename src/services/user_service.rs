use sqlx::SqlitePool;
use tracing::info;

use super::{new_id, ServiceError, ServiceResult};
use crate::database::models::User;
use crate::types::now_timestamp;

pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, email: &str) -> ServiceResult<User> {
        let name = name.trim();
        let email = email.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(ServiceError::BadRequest("User name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(ServiceError::BadRequest(format!("Invalid email address: {}", email)));
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("User already exists: {}", email)));
        }

        let user = User {
            id: new_id(),
            name: name.to_string(),
            email,
            created_at: now_timestamp(),
        };

        sqlx::query("INSERT INTO users (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.created_at)
            .execute(&self.pool)
            .await?;

        info!("Created user {} <{}>", user.id, user.email);
        Ok(user)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<User> {
        sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE email = ?")
            .bind(email.trim().to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
