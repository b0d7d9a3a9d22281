use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, persistence_error, read_error, timestamp, Page, Pagination};
use crate::errors::{AppError, AppResult};
use crate::models::resource::{NewResource, Resource, ResourceFilter, ResourcePatch};

const SELECT: &str = "SELECT r.resource_id, r.org_id, r.name, r.description, r.type, r.capacity, \
     r.is_active, r.created_at, r.updated_at FROM resources r";

#[derive(Debug, Clone)]
pub struct ResourceRepository {
    pool: SqlitePool,
}

impl ResourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new), fields(org_id = new.org_id, name = %new.name))]
    pub async fn create(&self, new: &NewResource) -> AppResult<Resource> {
        let now = timestamp();
        let resource_id = sqlx::query(
            "INSERT INTO resources (org_id, name, description, type, capacity, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.org_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.resource_type)
        .bind(new.capacity)
        .bind(new.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(persistence_error("resource", "create", None, new))?
        .last_insert_rowid();

        self.get_by_id(resource_id)
            .await?
            .ok_or_else(|| AppError::internal("resource missing after insert"))
    }

    pub async fn get_by_id(&self, resource_id: i64) -> AppResult<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>(&format!("{SELECT} WHERE r.resource_id = ?"))
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("resource", "get", Some(resource_id)))?;
        Ok(resource)
    }

    pub async fn list(&self, filter: &ResourceFilter, window: Pagination) -> AppResult<Page<Resource>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM resources r");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("resource", "count", None))?;

        let mut rows = QueryBuilder::<Sqlite>::new(SELECT);
        push_filters(&mut rows, filter);
        rows.push(" ORDER BY r.name COLLATE NOCASE, r.resource_id LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let items = rows
            .build_query_as::<Resource>()
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("resource", "list", None))?;

        Ok(Page::new(items, total, window))
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, resource_id: i64, patch: &ResourcePatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE resources SET ");
        let mut set = query.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &patch.description {
            set.push("description = ").push_bind_unseparated(description.clone());
        }
        if let Some(resource_type) = &patch.resource_type {
            set.push("type = ").push_bind_unseparated(resource_type.clone());
        }
        if let Some(capacity) = patch.capacity {
            set.push("capacity = ").push_bind_unseparated(capacity);
        }
        if let Some(is_active) = patch.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        set.push("updated_at = ").push_bind_unseparated(timestamp());
        query.push(" WHERE resource_id = ").push_bind(resource_id);

        query
            .build()
            .execute(&self.pool)
            .await
            .map_err(persistence_error("resource", "update", Some(resource_id), patch))?;
        Ok(())
    }

    /// Deleting a missing resource succeeds. Shifts referencing it keep their
    /// row with `resource_id` cleared.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, resource_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM resources WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&self.pool)
            .await
            .map_err(persistence_error("resource", "delete", Some(resource_id), &resource_id))?;
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ResourceFilter) {
    query.push(" WHERE r.org_id = ").push_bind(filter.org_id);
    if let Some(resource_type) = &filter.resource_type {
        query.push(" AND r.type = ").push_bind(resource_type.clone());
    }
    if let Some(is_active) = filter.is_active {
        query.push(" AND r.is_active = ").push_bind(is_active);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        query
            .push(" AND (r.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR r.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, OrganizationRepository};
    use crate::models::organization::NewOrganization;

    async fn setup() -> (ResourceRepository, i64) {
        let pool = test_pool().await;
        let org = OrganizationRepository::new(pool.clone())
            .create(&NewOrganization {
                name: "Alpha".into(),
                parent_org_id: None,
            })
            .await
            .unwrap();
        (ResourceRepository::new(pool), org.org_id)
    }

    fn room(org_id: i64, name: &str) -> NewResource {
        NewResource {
            org_id,
            name: name.to_string(),
            description: Some("Second floor".into()),
            resource_type: "room".into(),
            capacity: Some(8),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn partial_update_keeps_other_columns() {
        let (repo, org_id) = setup().await;
        let created = repo.create(&room(org_id, "Room A")).await.unwrap();

        let patch = ResourcePatch {
            capacity: Some(None),
            is_active: Some(false),
            ..Default::default()
        };
        repo.update(created.resource_id, &patch).await.unwrap();

        let updated = repo.get_by_id(created.resource_id).await.unwrap().unwrap();
        assert_eq!(updated.capacity, None);
        assert!(!updated.is_active);
        assert_eq!(updated.name, "Room A");
        assert_eq!(updated.description.as_deref(), Some("Second floor"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (repo, org_id) = setup().await;
        let created = repo.create(&room(org_id, "Room A")).await.unwrap();

        repo.delete(created.resource_id).await.unwrap();
        repo.delete(created.resource_id).await.unwrap();
        repo.delete(424242).await.unwrap();
        assert!(repo.get_by_id(created.resource_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_window_is_a_slice_of_the_ordered_set() {
        let (repo, org_id) = setup().await;
        for name in ["E", "A", "D", "B", "C"] {
            repo.create(&room(org_id, name)).await.unwrap();
        }

        let all = repo
            .list(
                &ResourceFilter {
                    org_id,
                    resource_type: None,
                    is_active: None,
                    search: None,
                },
                Pagination::new(100, 0),
            )
            .await
            .unwrap();
        let window = repo
            .list(
                &ResourceFilter {
                    org_id,
                    resource_type: Some("room".into()),
                    is_active: Some(true),
                    search: None,
                },
                Pagination::new(2, 1),
            )
            .await
            .unwrap();

        assert_eq!(window.total, 5);
        assert_eq!(window.items, all.items[1..3].to_vec());
    }
}
