use chrono::Duration;

use super::{ApiResponse, RequestCtx};
use crate::errors::{AppError, AppResult};
use crate::models::shift::{NewShift, ShiftFilter, ShiftPatch, ShiftStatus};
use crate::validation::{
    CrossRule, DefaultValue, FieldKind, FieldSpec, Params, Schema, LIMIT, OFFSET, PAGE, PER_PAGE,
};

const ORG_ID: FieldSpec = FieldSpec::new("org_id", FieldKind::Id).required().describe("owning organization");
const ID: FieldSpec = FieldSpec::new("id", FieldKind::Id).required().describe("shift id");
const RESOURCE_ID: FieldSpec = FieldSpec::new("resource_id", FieldKind::Id).nullable();
const USER_ID: FieldSpec = FieldSpec::new("user_id", FieldKind::Id).nullable().describe("assigned member");
const STATUS: FieldSpec = FieldSpec::new("status", FieldKind::Enum(&ShiftStatus::ALL));
const TITLE: FieldSpec = FieldSpec::new("title", FieldKind::Text).nullable();
const NOTES: FieldSpec = FieldSpec::new("notes", FieldKind::Textarea).nullable();

const END_AFTER_START: CrossRule = CrossRule {
    param: "end_time",
    triggers: &["start_time", "end_time"],
    code: None,
    check: end_after_start,
};

pub static LIST: Schema = Schema {
    fields: &[
        ORG_ID,
        PAGE,
        PER_PAGE,
        LIMIT,
        OFFSET,
        FieldSpec::new("resource_id", FieldKind::Id),
        FieldSpec::new("user_id", FieldKind::Id),
        STATUS,
        FieldSpec::new("start_date", FieldKind::Date).describe("first day (inclusive) of start_time"),
        FieldSpec::new("end_date", FieldKind::Date).describe("last day (inclusive) of start_time"),
    ],
    cross: &[CrossRule {
        param: "end_date",
        triggers: &["start_date", "end_date"],
        code: None,
        check: end_date_not_before_start_date,
    }],
};

pub static CREATE: Schema = Schema {
    fields: &[
        ORG_ID,
        RESOURCE_ID,
        USER_ID,
        FieldSpec::new("start_time", FieldKind::DateTime).required(),
        FieldSpec::new("end_time", FieldKind::DateTime).required(),
        TITLE,
        NOTES,
        STATUS.default(DefaultValue::Text("pending")),
    ],
    cross: &[END_AFTER_START],
};

pub static BY_ID: Schema = Schema {
    fields: &[ID],
    cross: &[],
};

pub static UPDATE: Schema = Schema {
    fields: &[
        ID,
        RESOURCE_ID,
        USER_ID,
        FieldSpec::new("start_time", FieldKind::DateTime),
        FieldSpec::new("end_time", FieldKind::DateTime),
        TITLE,
        NOTES,
        STATUS,
    ],
    cross: &[END_AFTER_START],
};

fn end_after_start(params: &Params) -> Result<(), String> {
    match (params.datetime("start_time"), params.datetime("end_time")) {
        (Some(start), Some(end)) if end <= start => Err("end_time must be after start_time".to_string()),
        _ => Ok(()),
    }
}

fn end_date_not_before_start_date(params: &Params) -> Result<(), String> {
    match (params.datetime("start_date"), params.datetime("end_date")) {
        (Some(start), Some(end)) if end < start => Err("end_date must not be before start_date".to_string()),
        _ => Ok(()),
    }
}

pub async fn list(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let params = &ctx.params;
    let filter = ShiftFilter {
        org_id: ctx.organization()?.org_id,
        resource_id: params.int("resource_id"),
        user_id: params.int("user_id"),
        status: params.parsed("status")?,
        starts_from: params.datetime("start_date"),
        starts_before: params.datetime("end_date").map(|day| day + Duration::days(1)),
    };

    let page = ctx.state.repos.shifts.list(&filter, ctx.pagination()).await?;
    ApiResponse::ok("Shifts retrieved.", page)
}

pub async fn create(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let params = &ctx.params;
    let new = NewShift {
        org_id: ctx.organization()?.org_id,
        resource_id: params.int("resource_id"),
        user_id: params.int("user_id"),
        start_time: params.require_datetime("start_time")?,
        end_time: params.require_datetime("end_time")?,
        title: params.text("title").map(str::to_string),
        notes: params.text("notes").map(str::to_string),
        status: params.parsed("status")?.unwrap_or_default(),
    };

    let shift = ctx.state.repos.shifts.create(&new).await?;
    tracing::info!(shift_id = shift.shift_id, org_id = shift.org_id, "shift created");
    ApiResponse::created("Shift created.", shift)
}

pub async fn get(ctx: RequestCtx) -> AppResult<ApiResponse> {
    ApiResponse::ok("Shift retrieved.", ctx.shift()?)
}

pub async fn update(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let shift = ctx.shift()?;
    let (shift_id, org_id) = (shift.shift_id, shift.org_id);
    let params = &ctx.params;
    let patch = ShiftPatch {
        resource_id: params.patch_int("resource_id"),
        user_id: params.patch_int("user_id"),
        start_time: params.datetime("start_time"),
        end_time: params.datetime("end_time"),
        title: params.patch_text("title"),
        notes: params.patch_text("notes"),
        status: params.parsed("status")?,
    };

    let repo = &ctx.state.repos.shifts;
    repo.update(shift_id, org_id, &patch).await?;

    let shift = repo
        .get_by_id(shift_id)
        .await?
        .ok_or_else(|| AppError::not_found("Shift not found."))?;
    ApiResponse::ok("Shift updated.", shift)
}

pub async fn delete(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let shift_id = ctx.shift()?.shift_id;
    ctx.state.repos.shifts.delete(shift_id).await?;

    tracing::info!(shift_id, "shift deleted");
    ApiResponse::ok("Shift deleted.", serde_json::json!({ "shift_id": shift_id }))
}
