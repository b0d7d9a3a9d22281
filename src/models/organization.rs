use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::member::InternalRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Organization {
    pub org_id: i64,
    #[schema(example = "Alpha")]
    pub name: String,
    pub parent_org_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub parent_org_id: Option<i64>,
}

/// Partial update. `parent_org_id: Some(None)` detaches from the parent.
#[derive(Debug, Clone, Default)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub parent_org_id: Option<Option<i64>>,
}

impl OrganizationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_org_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationFilter {
    /// Restrict to organizations this user is a member of.
    pub member_user_id: Option<i64>,
    pub parent_org_id: Option<i64>,
    pub search: Option<String>,
}

/// Single-organization payload: the organization plus what the caller holds in it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub internal_role: Option<InternalRole>,
    pub plugin_roles: Vec<String>,
}
