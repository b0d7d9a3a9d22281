use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::{foreign_key, persistence_error, read_error, timestamp, Page, Pagination};
use crate::errors::{AppError, AppResult};
use crate::models::shift::{DbShift, NewShift, Shift, ShiftFilter, ShiftPatch};
use crate::utils::to_whole_seconds;

const SELECT: &str = "SELECT s.shift_id, s.org_id, s.resource_id, s.user_id, s.start_time, s.end_time, \
     s.title, s.notes, s.status, s.created_at, s.updated_at FROM shifts s";

/// Shift storage. Reference checks and the write share one transaction.
/// Overlapping shifts for the same resource or user are allowed.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new), fields(org_id = new.org_id))]
    pub async fn create(&self, new: &NewShift) -> AppResult<Shift> {
        let resource_id = foreign_key(new.resource_id);
        let user_id = foreign_key(new.user_id);
        let now = timestamp();

        let mut tx = self.pool.begin().await?;
        check_references(&mut *tx, new.org_id, resource_id, user_id).await?;

        let shift_id = sqlx::query(
            "INSERT INTO shifts (org_id, resource_id, user_id, start_time, end_time, title, notes, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.org_id)
        .bind(resource_id)
        .bind(user_id)
        .bind(to_whole_seconds(new.start_time))
        .bind(to_whole_seconds(new.end_time))
        .bind(&new.title)
        .bind(&new.notes)
        .bind(new.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(persistence_error("shift", "create", None, new))?
        .last_insert_rowid();

        tx.commit().await?;

        self.get_by_id(shift_id)
            .await?
            .ok_or_else(|| AppError::internal("shift missing after insert"))
    }

    pub async fn get_by_id(&self, shift_id: i64) -> AppResult<Option<Shift>> {
        let row = sqlx::query_as::<_, DbShift>(&format!("{SELECT} WHERE s.shift_id = ?"))
            .bind(shift_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("shift", "get", Some(shift_id)))?;
        row.map(Shift::try_from).transpose()
    }

    pub async fn list(&self, filter: &ShiftFilter, window: Pagination) -> AppResult<Page<Shift>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM shifts s");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("shift", "count", None))?;

        let mut rows = QueryBuilder::<Sqlite>::new(SELECT);
        push_filters(&mut rows, filter);
        rows.push(" ORDER BY s.start_time, s.shift_id LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let items = rows
            .build_query_as::<DbShift>()
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("shift", "list", None))?
            .into_iter()
            .map(Shift::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Page::new(items, total, window))
    }

    /// `org_id` is the shift's owning organization; it never changes.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, shift_id: i64, org_id: i64, patch: &ShiftPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let resource_id = patch.resource_id.map(foreign_key);
        let user_id = patch.user_id.map(foreign_key);

        let mut tx = self.pool.begin().await?;
        check_references(&mut *tx, org_id, resource_id.flatten(), user_id.flatten()).await?;

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE shifts SET ");
        let mut set = query.separated(", ");
        if let Some(resource_id) = resource_id {
            set.push("resource_id = ").push_bind_unseparated(resource_id);
        }
        if let Some(user_id) = user_id {
            set.push("user_id = ").push_bind_unseparated(user_id);
        }
        if let Some(start_time) = patch.start_time {
            set.push("start_time = ").push_bind_unseparated(to_whole_seconds(start_time));
        }
        if let Some(end_time) = patch.end_time {
            set.push("end_time = ").push_bind_unseparated(to_whole_seconds(end_time));
        }
        if let Some(title) = &patch.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(notes) = &patch.notes {
            set.push("notes = ").push_bind_unseparated(notes.clone());
        }
        if let Some(status) = patch.status {
            set.push("status = ").push_bind_unseparated(status.as_str());
        }
        set.push("updated_at = ").push_bind_unseparated(timestamp());
        query.push(" WHERE shift_id = ").push_bind(shift_id);

        query
            .build()
            .execute(&mut *tx)
            .await
            .map_err(persistence_error("shift", "update", Some(shift_id), patch))?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, shift_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM shifts WHERE shift_id = ?")
            .bind(shift_id)
            .execute(&self.pool)
            .await
            .map_err(persistence_error("shift", "delete", Some(shift_id), &shift_id))?;
        Ok(())
    }
}

/// A shift may only point at a resource of its own organization and at a
/// user who is a member there.
async fn check_references(
    conn: &mut SqliteConnection,
    org_id: i64,
    resource_id: Option<i64>,
    user_id: Option<i64>,
) -> AppResult<()> {
    if let Some(resource_id) = resource_id {
        let owner = sqlx::query_scalar::<_, i64>("SELECT org_id FROM resources WHERE resource_id = ?")
            .bind(resource_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(read_error("resource", "owner", Some(resource_id)))?;
        if owner != Some(org_id) {
            return Err(AppError::bad_request(
                "resource_not_in_organization",
                "The resource does not belong to this organization.",
            ));
        }
    }

    if let Some(user_id) = user_id {
        let member = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM organization_members WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(read_error("member", "exists", Some(user_id)))?;
        if member.is_none() {
            return Err(AppError::bad_request(
                "user_not_member",
                "The assigned user is not a member of this organization.",
            ));
        }
    }

    Ok(())
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ShiftFilter) {
    query.push(" WHERE s.org_id = ").push_bind(filter.org_id);
    if let Some(resource_id) = filter.resource_id {
        query.push(" AND s.resource_id = ").push_bind(resource_id);
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND s.user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.starts_from {
        query.push(" AND s.start_time >= ").push_bind(to_whole_seconds(from));
    }
    if let Some(before) = filter.starts_before {
        query.push(" AND s.start_time < ").push_bind(to_whole_seconds(before));
    }
}
