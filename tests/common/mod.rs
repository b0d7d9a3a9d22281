#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use shift_planner::create_app;
use shift_planner::identity;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub struct TestUser {
    pub user_id: i64,
    pub token: String,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempdir()?;
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
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, Value)> {
        self.call("GET", uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> Result<(StatusCode, Value)> {
        self.call("POST", uri, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> Result<(StatusCode, Value)> {
        self.call("PUT", uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, Value)> {
        self.call("DELETE", uri, Some(&user.token), None).await
    }

    pub async fn register(&self, name: &str) -> Result<TestUser> {
        let email = format!("{}@example.com", name.to_lowercase());
        let (status, body) = self
            .call(
                "POST",
                "/auth/register",
                None,
                Some(json!({"display_name": name, "email": email, "password": "password123"})),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        Ok(TestUser {
            user_id: body["data"]["user"]["user_id"].as_i64().expect("user_id"),
            token: body["data"]["token"].as_str().expect("token").to_string(),
        })
    }

    pub async fn site_admin(&self, name: &str) -> Result<TestUser> {
        let user = self.register(name).await?;
        identity::set_site_admin(&self.pool, user.user_id, true).await?;
        Ok(user)
    }

    pub async fn create_org(&self, admin: &TestUser, name: &str, parent: Option<i64>) -> Result<i64> {
        let (status, body) = self
            .post("/organizations", admin, json!({"name": name, "parent_org_id": parent}))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create org failed: {}", body);
        Ok(body["data"]["org_id"].as_i64().expect("org_id"))
    }

    pub async fn add_member(&self, actor: &TestUser, org_id: i64, user_id: i64, role: &str) -> Result<()> {
        let (status, body) = self
            .post(
                "/organization_members",
                actor,
                json!({"org_id": org_id, "user_id": user_id, "internal_role": role}),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "add member failed: {}", body);
        Ok(())
    }

    pub async fn create_resource(&self, actor: &TestUser, org_id: i64, name: &str) -> Result<i64> {
        let (status, body) = self
            .post("/resources", actor, json!({"org_id": org_id, "name": name, "type": "room", "capacity": 4}))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create resource failed: {}", body);
        Ok(body["data"]["resource_id"].as_i64().expect("resource_id"))
    }
}

pub fn error_code(body: &Value) -> &str {
    body["data"]["code"].as_str().unwrap_or_default()
}
