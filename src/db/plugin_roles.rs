use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};

use super::{persistence_error, read_error, timestamp};
use crate::errors::AppResult;
use crate::models::plugin_role::PluginRoleGrant;

/// Flat per-organization plugin-role grants. Eligibility of the grantee is
/// checked by the caller before anything here runs.
#[derive(Debug, Clone)]
pub struct PluginRoleRepository {
    pool: SqlitePool,
}

impl PluginRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn for_member(&self, org_id: i64, user_id: i64) -> AppResult<Vec<String>> {
        let roles = sqlx::query_scalar::<_, String>(
            "SELECT plugin_role FROM plugin_roles WHERE org_id = ? AND user_id = ? ORDER BY plugin_role",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("plugin_role", "for_member", Some(user_id)))?;
        Ok(roles)
    }

    /// Grants in one organization keyed by user.
    pub async fn for_organization(&self, org_id: i64) -> AppResult<HashMap<i64, Vec<String>>> {
        let rows = sqlx::query_as::<_, PluginRoleGrant>(
            "SELECT user_id, org_id, plugin_role, created_at FROM plugin_roles WHERE org_id = ? ORDER BY plugin_role",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("plugin_role", "for_organization", Some(org_id)))?;

        let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
        for grant in rows {
            by_user.entry(grant.user_id).or_default().push(grant.plugin_role);
        }
        Ok(by_user)
    }

    /// Adds one grant. Granting an existing role is a no-op.
    pub async fn grant(&self, org_id: i64, user_id: i64, role: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO plugin_roles (user_id, org_id, plugin_role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(role)
        .bind(timestamp())
        .execute(&self.pool)
        .await
        .map_err(persistence_error("plugin_role", "grant", Some(user_id), &role))?;
        Ok(())
    }

    pub async fn revoke(&self, org_id: i64, user_id: i64, role: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM plugin_roles WHERE org_id = ? AND user_id = ? AND plugin_role = ?")
            .bind(org_id)
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(persistence_error("plugin_role", "revoke", Some(user_id), &role))?;
        Ok(())
    }
}

/// Makes the grant set for (org, user) exactly `roles`: drop all, re-add.
pub(crate) async fn replace(
    conn: &mut SqliteConnection,
    org_id: i64,
    user_id: i64,
    roles: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM plugin_roles WHERE org_id = ? AND user_id = ?")
        .bind(org_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let now = timestamp();
    for role in roles {
        sqlx::query(
            "INSERT OR IGNORE INTO plugin_roles (user_id, org_id, plugin_role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(role)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_user, test_pool, OrganizationRepository};
    use crate::models::organization::NewOrganization;

    #[tokio::test]
    async fn grants_are_multi_valued_and_individually_removable() {
        let pool = test_pool().await;
        let orgs = OrganizationRepository::new(pool.clone());
        let org = orgs
            .create(&NewOrganization {
                name: "Alpha".into(),
                parent_org_id: None,
            })
            .await
            .unwrap();
        let user_id = insert_user(&pool, "Grace").await;
        let repo = PluginRoleRepository::new(pool);

        repo.grant(org.org_id, user_id, "scheduler").await.unwrap();
        repo.grant(org.org_id, user_id, "employee").await.unwrap();
        repo.grant(org.org_id, user_id, "employee").await.unwrap();
        assert_eq!(repo.for_member(org.org_id, user_id).await.unwrap(), ["employee", "scheduler"]);

        repo.revoke(org.org_id, user_id, "employee").await.unwrap();
        assert_eq!(repo.for_member(org.org_id, user_id).await.unwrap(), ["scheduler"]);

        let by_user = repo.for_organization(org.org_id).await.unwrap();
        assert_eq!(by_user.get(&user_id).map(Vec::len), Some(1));
    }
}
