use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::plugin_roles::{replace as replace_grants, PluginRoleRepository};
use super::{like_pattern, persistence_error, read_error, timestamp, Page, Pagination};
use crate::errors::{AppError, AppResult};
use crate::models::member::{DbMember, InternalRole, Member, MemberFilter, MemberPatch, NewMember};

const SELECT: &str = "SELECT m.org_id, m.user_id, u.display_name, u.email, m.internal_role, \
     m.employment_number, m.created_at, m.updated_at \
     FROM organization_members m JOIN users u ON u.user_id = m.user_id";

#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
    grants: PluginRoleRepository,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            grants: PluginRoleRepository::new(pool.clone()),
            pool,
        }
    }

    /// Inserts the membership and, when given, its plugin-role set in one transaction.
    #[tracing::instrument(skip(self, new, plugin_roles), fields(org_id = new.org_id, user_id = new.user_id))]
    pub async fn create(&self, new: &NewMember, plugin_roles: Option<&[String]>) -> AppResult<Member> {
        let now = timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO organization_members (user_id, org_id, internal_role, employment_number, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new.user_id)
        .bind(new.org_id)
        .bind(new.internal_role.as_str())
        .bind(&new.employment_number)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(persistence_error("member", "create", Some(new.user_id), new))?;

        if let Some(roles) = plugin_roles {
            replace_grants(&mut *tx, new.org_id, new.user_id, roles)
                .await
                .map_err(persistence_error("plugin_role", "replace", Some(new.user_id), &roles))?;
        }

        tx.commit().await?;

        self.get(new.org_id, new.user_id)
            .await?
            .ok_or_else(|| AppError::internal("membership missing after insert"))
    }

    pub async fn get(&self, org_id: i64, user_id: i64) -> AppResult<Option<Member>> {
        let row = sqlx::query_as::<_, DbMember>(&format!("{SELECT} WHERE m.org_id = ? AND m.user_id = ?"))
            .bind(org_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("member", "get", Some(user_id)))?;

        match row {
            Some(row) => {
                let roles = self.grants.for_member(org_id, user_id).await?;
                Ok(Some(row.into_member(roles)?))
            }
            None => Ok(None),
        }
    }

    pub async fn role_of(&self, org_id: i64, user_id: i64) -> AppResult<Option<InternalRole>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT internal_role FROM organization_members WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("member", "role", Some(user_id)))?;

        role.map(|role| role.parse()).transpose()
    }

    pub async fn list(&self, filter: &MemberFilter, window: Pagination) -> AppResult<Page<Member>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM organization_members m JOIN users u ON u.user_id = m.user_id",
        );
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("member", "count", None))?;

        let mut rows = QueryBuilder::<Sqlite>::new(SELECT);
        push_filters(&mut rows, filter);
        rows.push(" ORDER BY u.display_name COLLATE NOCASE, m.user_id LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let rows = rows
            .build_query_as::<DbMember>()
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("member", "list", None))?;

        let mut grants = self.grants.for_organization(filter.org_id).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let roles = grants.remove(&row.user_id).unwrap_or_default();
                row.into_member(roles)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Page::new(items, total, window))
    }

    /// Partial update of the membership row; a supplied plugin-role set
    /// replaces the current one. Both happen in one transaction.
    #[tracing::instrument(skip(self, patch, plugin_roles))]
    pub async fn update(
        &self,
        org_id: i64,
        user_id: i64,
        patch: &MemberPatch,
        plugin_roles: Option<&[String]>,
    ) -> AppResult<()> {
        if patch.is_empty() && plugin_roles.is_none() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if !patch.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE organization_members SET ");
            let mut set = query.separated(", ");
            if let Some(role) = patch.internal_role {
                set.push("internal_role = ").push_bind_unseparated(role.as_str());
            }
            if let Some(employment_number) = &patch.employment_number {
                set.push("employment_number = ")
                    .push_bind_unseparated(employment_number.clone());
            }
            set.push("updated_at = ").push_bind_unseparated(timestamp());
            query
                .push(" WHERE org_id = ")
                .push_bind(org_id)
                .push(" AND user_id = ")
                .push_bind(user_id);

            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(persistence_error("member", "update", Some(user_id), patch))?;
        }

        if let Some(roles) = plugin_roles {
            replace_grants(&mut *tx, org_id, user_id, roles)
                .await
                .map_err(persistence_error("plugin_role", "replace", Some(user_id), &roles))?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Drops the membership and the user's plugin roles in the organization.
    /// Removing a non-member succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, org_id: i64, user_id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        replace_grants(&mut *tx, org_id, user_id, &[])
            .await
            .map_err(persistence_error("plugin_role", "delete", Some(user_id), &org_id))?;

        sqlx::query("DELETE FROM organization_members WHERE org_id = ? AND user_id = ?")
            .bind(org_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(persistence_error("member", "delete", Some(user_id), &org_id))?;

        tx.commit().await?;
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &MemberFilter) {
    query.push(" WHERE m.org_id = ").push_bind(filter.org_id);
    if let Some(role) = filter.internal_role {
        query.push(" AND m.internal_role = ").push_bind(role.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        query
            .push(" AND (u.display_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR u.email LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR m.employment_number LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}
