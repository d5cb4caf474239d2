#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use servicehub::create_app;

pub const PASSWORD: &str = "password123";

/// App over a fresh migrated SQLite file. Keep the `TempDir` alive for the
/// whole test or the database disappears underneath the pool.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Sends one request; returns the status and the parsed body (`Null` when empty).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, value))
    }

    /// Bootstrap registration; the first user becomes OWNER. Returns the token.
    pub async fn register_owner(&self) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "name": "Olivia Owner", "email": "owner@example.com", "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "bootstrap register failed: {body}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    /// Creates a user with the given roles through the API and logs them in.
    /// Returns `(user_id, token)`.
    pub async fn user_with_roles(&self, owner_token: &str, email: &str, roles: &[&str]) -> Result<(String, String)> {
        let (status, body) = self
            .send(
                "POST",
                "/users",
                Some(owner_token),
                Some(json!({ "name": email, "email": email, "password": PASSWORD, "roles": roles })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {body}");
        let user_id = body["id"].as_str().unwrap_or_default().to_string();

        let token = self.login(email).await?;
        Ok((user_id, token))
    }

    pub async fn login(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    pub async fn create_client(&self, token: &str, name: &str) -> Result<String> {
        let (status, body) = self
            .send("POST", "/clients", Some(token), Some(json!({ "name": name })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create client failed: {body}");
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }

    /// Audit records for one entity, oldest first.
    pub async fn audit_trail(&self, token: &str, entity_type: &str, entity_id: &str) -> Result<Vec<Value>> {
        let (status, body) = self
            .send(
                "GET",
                &format!("/audit-logs?entity_type={entity_type}&entity_id={entity_id}"),
                Some(token),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "audit list failed: {body}");
        let mut records = body["records"].as_array().cloned().unwrap_or_default();
        records.reverse();
        Ok(records)
    }
}

pub fn actions(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["action"].as_str().unwrap_or_default().to_string())
        .collect()
}
