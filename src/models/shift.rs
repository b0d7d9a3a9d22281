use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Pending,
    Confirmed,
    Cancelled,
    Draft,
}

impl ShiftStatus {
    pub const ALL: [&'static str; 4] = ["pending", "confirmed", "cancelled", "draft"];

    pub fn as_str(self) -> &'static str {
        match self {
            ShiftStatus::Pending => "pending",
            ShiftStatus::Confirmed => "confirmed",
            ShiftStatus::Cancelled => "cancelled",
            ShiftStatus::Draft => "draft",
        }
    }
}

impl Default for ShiftStatus {
    fn default() -> Self {
        ShiftStatus::Pending
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ShiftStatus::Pending),
            "confirmed" => Ok(ShiftStatus::Confirmed),
            "cancelled" => Ok(ShiftStatus::Cancelled),
            "draft" => Ok(ShiftStatus::Draft),
            other => Err(AppError::internal(format!("unknown shift status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Shift {
    pub shift_id: i64,
    pub org_id: i64,
    pub resource_id: Option<i64>,
    pub user_id: Option<i64>,
    #[schema(example = "2025-06-01T09:00:00Z")]
    pub start_time: DateTime<Utc>,
    #[schema(example = "2025-06-01T17:00:00Z")]
    pub end_time: DateTime<Utc>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: ShiftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbShift {
    pub shift_id: i64,
    pub org_id: i64,
    pub resource_id: Option<i64>,
    pub user_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbShift> for Shift {
    type Error = AppError;

    fn try_from(value: DbShift) -> Result<Self, Self::Error> {
        Ok(Shift {
            shift_id: value.shift_id,
            org_id: value.org_id,
            resource_id: value.resource_id,
            user_id: value.user_id,
            start_time: value.start_time,
            end_time: value.end_time,
            title: value.title,
            notes: value.notes,
            status: value.status.parse()?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewShift {
    pub org_id: i64,
    pub resource_id: Option<i64>,
    pub user_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: ShiftStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ShiftPatch {
    pub resource_id: Option<Option<i64>>,
    pub user_id: Option<Option<i64>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub title: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub status: Option<ShiftStatus>,
}

impl ShiftPatch {
    pub fn is_empty(&self) -> bool {
        self.resource_id.is_none()
            && self.user_id.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.title.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ShiftFilter {
    pub org_id: i64,
    pub resource_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<ShiftStatus>,
    /// Inclusive lower bound on `start_time`.
    pub starts_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `start_time`.
    pub starts_before: Option<DateTime<Utc>>,
}
