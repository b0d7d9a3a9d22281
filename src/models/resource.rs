use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Resource {
    pub resource_id: i64,
    pub org_id: i64,
    #[schema(example = "Meeting room A")]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    #[schema(example = "room")]
    pub resource_type: String,
    pub capacity: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub org_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub capacity: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub resource_type: Option<String>,
    pub capacity: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

impl ResourcePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.resource_type.is_none()
            && self.capacity.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceFilter {
    pub org_id: i64,
    pub resource_type: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
