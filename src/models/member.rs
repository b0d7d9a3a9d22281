use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Hierarchical per-organization role. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InternalRole {
    Employee,
    Scheduler,
    OrgAdmin,
}

impl InternalRole {
    pub const ALL: [&'static str; 3] = ["employee", "scheduler", "org_admin"];

    pub fn rank(self) -> u8 {
        match self {
            InternalRole::Employee => 1,
            InternalRole::Scheduler => 2,
            InternalRole::OrgAdmin => 3,
        }
    }

    pub fn satisfies(self, min: InternalRole) -> bool {
        self.rank() >= min.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InternalRole::Employee => "employee",
            InternalRole::Scheduler => "scheduler",
            InternalRole::OrgAdmin => "org_admin",
        }
    }
}

impl Default for InternalRole {
    fn default() -> Self {
        InternalRole::Employee
    }
}

impl fmt::Display for InternalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InternalRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(InternalRole::Employee),
            "scheduler" => Ok(InternalRole::Scheduler),
            "org_admin" => Ok(InternalRole::OrgAdmin),
            other => Err(AppError::internal(format!("unknown internal role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub org_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub email: String,
    pub internal_role: InternalRole,
    pub employment_number: Option<String>,
    /// Plugin-role tags granted to this user in the organization.
    pub plugin_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMember {
    pub org_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub email: String,
    pub internal_role: String,
    pub employment_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbMember {
    pub fn into_member(self, plugin_roles: Vec<String>) -> Result<Member, AppError> {
        Ok(Member {
            org_id: self.org_id,
            user_id: self.user_id,
            display_name: self.display_name,
            email: self.email,
            internal_role: self.internal_role.parse()?,
            employment_number: self.employment_number,
            plugin_roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub org_id: i64,
    pub user_id: i64,
    pub internal_role: InternalRole,
    pub employment_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub internal_role: Option<InternalRole>,
    pub employment_number: Option<Option<String>>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        self.internal_role.is_none() && self.employment_number.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct MemberFilter {
    pub org_id: i64,
    pub internal_role: Option<InternalRole>,
    /// Case-insensitive partial match on display name, email or employment number.
    pub search: Option<String>,
}
