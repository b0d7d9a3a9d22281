//! Placeholder aggregates. They answer with zeroed counters and
//! `implemented: false` until real reporting exists.

use serde::Serialize;
use utoipa::ToSchema;

use super::{ApiResponse, RequestCtx};
use crate::errors::AppResult;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct DashboardStats {
    pub organizations: i64,
    pub members: i64,
    pub resources: i64,
    pub upcoming_shifts: i64,
    pub implemented: bool,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ShiftSummary {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub draft: i64,
    pub implemented: bool,
}

pub async fn stats(_ctx: RequestCtx) -> AppResult<ApiResponse> {
    ApiResponse::ok("Dashboard statistics are not implemented yet.", DashboardStats::default())
}

pub async fn shift_summary(_ctx: RequestCtx) -> AppResult<ApiResponse> {
    ApiResponse::ok("Shift summary is not implemented yet.", ShiftSummary::default())
}
