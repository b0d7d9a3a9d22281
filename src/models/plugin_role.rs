use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Site-wide designation a user must hold before any plugin role can be granted.
pub const ELIGIBLE_CAPABILITY: &str = "schema_user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct PluginRoleGrant {
    pub user_id: i64,
    pub org_id: i64,
    #[schema(example = "scheduler")]
    pub plugin_role: String,
    pub created_at: DateTime<Utc>,
}
