//! Identity provider: who a user is and what they may do site-wide.
//!
//! The authorization engine only sees [`Principal`]s built here. Accounts,
//! the site-admin flag and capability tags live in the `users` and
//! `user_capabilities` tables.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::authz::Principal;
use crate::db::timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User};
use crate::utils::hash_password;

const USER_COLUMNS: &str =
    "user_id, display_name, email, password_hash, is_site_admin, created_at, updated_at";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the user no longer exists.
    async fn principal(&self, user_id: i64) -> AppResult<Option<Principal>>;
    async fn user_exists(&self, user_id: i64) -> AppResult<bool>;
    async fn has_capability(&self, user_id: i64, capability: &str) -> AppResult<bool>;
}

#[derive(Debug, Clone)]
pub struct SqliteIdentity {
    pool: SqlitePool,
}

impl SqliteIdentity {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentity {
    async fn principal(&self, user_id: i64) -> AppResult<Option<Principal>> {
        let site_admin = sqlx::query_scalar::<_, bool>("SELECT is_site_admin FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(site_admin) = site_admin else {
            return Ok(None);
        };

        let mut principal = Principal::new(user_id).with_capabilities(capabilities(&self.pool, user_id).await?);
        principal.site_admin = site_admin;
        Ok(Some(principal))
    }

    async fn user_exists(&self, user_id: i64) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn has_capability(&self, user_id: i64, capability: &str) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM user_capabilities WHERE user_id = ? AND capability = ?",
        )
        .bind(user_id)
        .bind(capability)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }
}

pub async fn create_user(pool: &SqlitePool, display_name: &str, email: &str, password: &str) -> AppResult<User> {
    if find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::conflict("Email already in use."));
    }

    let password_hash = hash_password(password)?;
    let now = timestamp();

    let user_id = sqlx::query(
        "INSERT INTO users (display_name, email, password_hash, is_site_admin, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(display_name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::conflict("Email already in use.")
        }
        _ => AppError::Database(err),
    })?
    .last_insert_rowid();

    tracing::info!(user_id, "user registered");

    find_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::internal("user missing after insert"))
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_user(pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) => {
            let caps = capabilities(pool, user_id).await?;
            Ok(Some(user.into_user(caps)))
        }
        None => Ok(None),
    }
}

pub async fn capabilities(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<String>> {
    let caps = sqlx::query_scalar::<_, String>(
        "SELECT capability FROM user_capabilities WHERE user_id = ? ORDER BY capability",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(caps)
}

pub async fn set_site_admin(pool: &SqlitePool, user_id: i64, site_admin: bool) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET is_site_admin = ?, updated_at = ? WHERE user_id = ?")
        .bind(site_admin)
        .bind(timestamp())
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found."));
    }
    tracing::info!(user_id, site_admin, "site admin flag changed");
    Ok(())
}

pub async fn grant_capability(pool: &SqlitePool, user_id: i64, capability: &str) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO user_capabilities (user_id, capability, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(capability)
        .bind(timestamp())
        .execute(pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::not_found("User not found.")
            }
            _ => AppError::Database(err),
        })?;
    tracing::info!(user_id, capability, "capability granted");
    Ok(())
}

pub async fn revoke_capability(pool: &SqlitePool, user_id: i64, capability: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM user_capabilities WHERE user_id = ? AND capability = ?")
        .bind(user_id)
        .bind(capability)
        .execute(pool)
        .await?;
    tracing::info!(user_id, capability, "capability revoked");
    Ok(())
}
