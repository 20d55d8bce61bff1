#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use dyntables::config::AppConfig;
use dyntables::database::models::NewToken;
use dyntables::database::DatabaseManager;
use dyntables::{app, AppState};

/// In-process app over a fresh in-memory database, with one user and an
/// admin token for it
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub user_id: String,
    pub admin_token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }

    /// `data` of a success envelope
    pub fn data(&self) -> Value {
        self.json().get("data").cloned().unwrap_or(Value::Null)
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(AppConfig::development()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let pool = DatabaseManager::connect_and_migrate("sqlite::memory:", 1).await?;
        let state = AppState::new(pool, Arc::new(config));
        let user = state.users().create("Owner", "owner@example.com").await?;
        let admin = state.tokens().create(&user.id, new_token("admin", json!(["admin"]))).await?;

        Ok(Self {
            router: app(state.clone()),
            state,
            user_id: user.id,
            admin_token: admin.token.context("admin token secret")?,
        })
    }

    /// Issue a token for the test user straight through the service
    pub async fn token(&self, permissions: Value, table_access: Option<Vec<String>>) -> Result<String> {
        let mut new = new_token("test", permissions);
        new.table_access = table_access;
        let view = self.state.tokens().create(&self.user_id, new).await?;
        view.token.context("token secret")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;

        Ok(TestResponse {
            status,
            headers,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<TestResponse> {
        self.send(Method::GET, uri, Some(token), &[], None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<TestResponse> {
        self.send(Method::POST, uri, Some(token), &[], Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<TestResponse> {
        self.send(Method::PUT, uri, Some(token), &[], Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<TestResponse> {
        self.send(Method::DELETE, uri, Some(token), &[], None).await
    }

    /// Create a table as the admin and return its id
    pub async fn create_table(&self, name: &str, table_type: &str, visibility: &str) -> Result<String> {
        let res = self
            .post(
                "/api/tables",
                &self.admin_token,
                json!({"name": name, "tableType": table_type, "visibility": visibility}),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create table failed: {}", res.text);
        res.data()["id"].as_str().map(str::to_string).context("table id")
    }

    pub async fn add_column(&self, table_id: &str, column: Value) -> Result<()> {
        let res = self
            .post(&format!("/api/tables/{}/columns", table_id), &self.admin_token, column)
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "add column failed: {}", res.text);
        Ok(())
    }

    /// Insert a row as the admin and return its id
    pub async fn add_row(&self, table_id: &str, data: Value) -> Result<String> {
        let res = self
            .post(&format!("/api/tables/{}/rows", table_id), &self.admin_token, data)
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "add row failed: {}", res.text);
        res.data()["id"].as_str().map(str::to_string).context("row id")
    }
}

pub fn new_token(name: &str, permissions: Value) -> NewToken {
    NewToken {
        name: name.to_string(),
        permissions: Some(permissions),
        table_access: None,
        allowed_ips: Vec::new(),
        allowed_domains: Vec::new(),
        expires_at: None,
    }
}
