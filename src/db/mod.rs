use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::authz::MembershipSource;
use crate::errors::{AppError, AppResult};
use crate::models::member::InternalRole;
use crate::models::organization::Organization;
use crate::models::resource::Resource;
use crate::models::shift::Shift;
use crate::utils::{to_whole_seconds, utc_now};

mod members;
mod organizations;
mod pagination;
mod plugin_roles;
mod resources;
mod shifts;

pub use members::MemberRepository;
pub use organizations::OrganizationRepository;
pub use pagination::{Page, Pagination};
pub use plugin_roles::PluginRoleRepository;
pub use resources::ResourceRepository;
pub use shifts::ShiftRepository;

pub async fn init() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// All repositories over one pool. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub organizations: OrganizationRepository,
    pub members: MemberRepository,
    pub plugin_roles: PluginRoleRepository,
    pub resources: ResourceRepository,
    pub shifts: ShiftRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            organizations: OrganizationRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            plugin_roles: PluginRoleRepository::new(pool.clone()),
            resources: ResourceRepository::new(pool.clone()),
            shifts: ShiftRepository::new(pool),
        }
    }
}

#[async_trait]
impl MembershipSource for Repositories {
    async fn find_organization(&self, org_id: i64) -> AppResult<Option<Organization>> {
        self.organizations.get_by_id(org_id).await
    }

    async fn member_role(&self, org_id: i64, user_id: i64) -> AppResult<Option<InternalRole>> {
        self.members.role_of(org_id, user_id).await
    }

    async fn find_resource(&self, resource_id: i64) -> AppResult<Option<Resource>> {
        self.resources.get_by_id(resource_id).await
    }

    async fn find_shift(&self, shift_id: i64) -> AppResult<Option<Shift>> {
        self.shifts.get_by_id(shift_id).await
    }
}

/// Storage timestamps are kept at whole seconds so their text form sorts.
pub(crate) fn timestamp() -> DateTime<Utc> {
    to_whole_seconds(utc_now())
}

/// Foreign keys are stored as positive integers or NULL.
pub(crate) fn foreign_key(id: Option<i64>) -> Option<i64> {
    id.map(i64::abs).filter(|id| *id > 0)
}

/// Maps a failed write to the caller-facing error. Unique violations become
/// a conflict; everything else is logged with its context and left opaque.
pub(crate) fn persistence_error<'a>(
    entity: &'static str,
    operation: &'static str,
    id: Option<i64>,
    data: &'a dyn fmt::Debug,
) -> impl FnOnce(sqlx::Error) -> AppError + 'a {
    move |err| match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::conflict(format!("The {entity} already exists."))
        }
        _ => {
            tracing::error!(entity, operation, id = ?id, data = ?data, error = %err, "persistence failure");
            AppError::Database(err)
        }
    }
}

/// Maps a failed read, logging which lookup failed.
pub(crate) fn read_error(
    entity: &'static str,
    operation: &'static str,
    id: Option<i64>,
) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        tracing::error!(entity, operation, id = ?id, error = %err, "read failure");
        AppError::Database(err)
    }
}

/// `LIKE` pattern for a case-insensitive substring match; use with `ESCAPE '\'`.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
pub(crate) async fn insert_user(pool: &SqlitePool, name: &str) -> i64 {
    let now = timestamp();
    sqlx::query(
        "INSERT INTO users (display_name, email, password_hash, created_at, updated_at) VALUES (?, ?, 'x', ?, ?)",
    )
    .bind(name)
    .bind(format!("{}@example.com", name.to_lowercase()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert user")
    .last_insert_rowid()
}
