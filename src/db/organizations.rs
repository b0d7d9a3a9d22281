use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{foreign_key, like_pattern, persistence_error, read_error, timestamp, Page, Pagination};
use crate::errors::{AppError, AppResult};
use crate::models::organization::{NewOrganization, Organization, OrganizationFilter, OrganizationPatch};

const SELECT: &str =
    "SELECT o.org_id, o.name, o.parent_org_id, o.created_at, o.updated_at FROM organizations o";

#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: SqlitePool,
}

impl OrganizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(name = %new.name))]
    pub async fn create(&self, new: &NewOrganization) -> AppResult<Organization> {
        let now = timestamp();
        let org_id = sqlx::query(
            "INSERT INTO organizations (name, parent_org_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(foreign_key(new.parent_org_id))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(persistence_error("organization", "create", None, new))?
        .last_insert_rowid();

        self.get_by_id(org_id)
            .await?
            .ok_or_else(|| AppError::internal("organization missing after insert"))
    }

    pub async fn get_by_id(&self, org_id: i64) -> AppResult<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(&format!("{SELECT} WHERE o.org_id = ?"))
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("organization", "get", Some(org_id)))?;
        Ok(org)
    }

    pub async fn list(&self, filter: &OrganizationFilter, window: Pagination) -> AppResult<Page<Organization>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM organizations o");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("organization", "count", None))?;

        let mut rows = QueryBuilder::<Sqlite>::new(SELECT);
        push_filters(&mut rows, filter);
        rows.push(" ORDER BY o.name COLLATE NOCASE, o.org_id LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let items = rows
            .build_query_as::<Organization>()
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("organization", "list", None))?;

        Ok(Page::new(items, total, window))
    }

    /// Only supplied fields change; an empty patch touches nothing.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, org_id: i64, patch: &OrganizationPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE organizations SET ");
        let mut set = query.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(parent) = patch.parent_org_id {
            set.push("parent_org_id = ").push_bind_unseparated(foreign_key(parent));
        }
        set.push("updated_at = ").push_bind_unseparated(timestamp());
        query.push(" WHERE org_id = ").push_bind(org_id);

        query
            .build()
            .execute(&self.pool)
            .await
            .map_err(persistence_error("organization", "update", Some(org_id), patch))?;
        Ok(())
    }

    /// Every organization above `org_id`, nearest first.
    pub async fn ancestor_ids(&self, org_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            WITH RECURSIVE chain(id, depth) AS (
                SELECT parent_org_id, 1 FROM organizations WHERE org_id = ?
                UNION
                SELECT o.parent_org_id, c.depth + 1 FROM organizations o JOIN chain c ON o.org_id = c.id
                WHERE c.depth < 1000
            )
            SELECT id FROM chain WHERE id IS NOT NULL ORDER BY depth
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("organization", "ancestors", Some(org_id)))?;
        Ok(ids)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &OrganizationFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.member_user_id {
        query
            .push(" AND EXISTS (SELECT 1 FROM organization_members m WHERE m.org_id = o.org_id AND m.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(parent) = filter.parent_org_id {
        query.push(" AND o.parent_org_id = ").push_bind(parent);
    }
    if let Some(search) = &filter.search {
        query
            .push(" AND o.name LIKE ")
            .push_bind(like_pattern(search))
            .push(" ESCAPE '\\'");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_user, test_pool};

    fn new_org(name: &str, parent: Option<i64>) -> NewOrganization {
        NewOrganization {
            name: name.to_string(),
            parent_org_id: parent,
        }
    }

    #[tokio::test]
    async fn created_organization_reads_back() {
        let repo = OrganizationRepository::new(test_pool().await);
        let parent = repo.create(&new_org("Parent", None)).await.unwrap();
        let child = repo.create(&new_org("Alpha", Some(parent.org_id))).await.unwrap();

        let fetched = repo.get_by_id(child.org_id).await.unwrap().expect("exists");
        assert_eq!(fetched.name, "Alpha");
        assert_eq!(fetched.parent_org_id, Some(parent.org_id));
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_patch_leaves_row_untouched() {
        let repo = OrganizationRepository::new(test_pool().await);
        let org = repo.create(&new_org("Alpha", None)).await.unwrap();

        repo.update(org.org_id, &OrganizationPatch::default()).await.unwrap();
        assert_eq!(repo.get_by_id(org.org_id).await.unwrap(), Some(org));
    }

    #[tokio::test]
    async fn patch_can_detach_parent() {
        let repo = OrganizationRepository::new(test_pool().await);
        let parent = repo.create(&new_org("Parent", None)).await.unwrap();
        let child = repo.create(&new_org("Child", Some(parent.org_id))).await.unwrap();

        let patch = OrganizationPatch {
            name: None,
            parent_org_id: Some(None),
        };
        repo.update(child.org_id, &patch).await.unwrap();

        let fetched = repo.get_by_id(child.org_id).await.unwrap().unwrap();
        assert_eq!(fetched.parent_org_id, None);
        assert_eq!(fetched.name, "Child");
    }

    #[tokio::test]
    async fn ancestors_walk_to_the_root() {
        let repo = OrganizationRepository::new(test_pool().await);
        let root = repo.create(&new_org("Root", None)).await.unwrap();
        let mid = repo.create(&new_org("Mid", Some(root.org_id))).await.unwrap();
        let leaf = repo.create(&new_org("Leaf", Some(mid.org_id))).await.unwrap();

        assert_eq!(repo.ancestor_ids(leaf.org_id).await.unwrap(), vec![mid.org_id, root.org_id]);
        assert!(repo.ancestor_ids(root.org_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_membership_and_paginates() {
        let pool = test_pool().await;
        let repo = OrganizationRepository::new(pool.clone());
        let user_id = insert_user(&pool, "Ada").await;

        let mut ids = Vec::new();
        for name in ["Delta", "Alpha", "Charlie", "Bravo"] {
            ids.push(repo.create(&new_org(name, None)).await.unwrap().org_id);
        }
        sqlx::query(
            "INSERT INTO organization_members (user_id, org_id, internal_role, created_at, updated_at) VALUES (?, ?, 'employee', ?, ?)",
        )
        .bind(user_id)
        .bind(ids[2])
        .bind(timestamp())
        .bind(timestamp())
        .execute(&pool)
        .await
        .unwrap();

        let page = repo
            .list(&OrganizationFilter::default(), Pagination::new(2, 1))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Bravo", "Charlie"]);
        assert_eq!(page.total, 4);

        let mine = OrganizationFilter {
            member_user_id: Some(user_id),
            ..Default::default()
        };
        let page = repo.list(&mine, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Charlie");
    }
}
