use super::{ApiResponse, RequestCtx};
use crate::errors::{AppError, AppResult};
use crate::models::resource::{NewResource, ResourceFilter, ResourcePatch};
use crate::validation::{not_empty, DefaultValue, FieldKind, FieldSpec, Schema, LIMIT, OFFSET, PAGE, PER_PAGE};

const ORG_ID: FieldSpec = FieldSpec::new("org_id", FieldKind::Id).required().describe("owning organization");
const ID: FieldSpec = FieldSpec::new("id", FieldKind::Id).required().describe("resource id");
const DESCRIPTION: FieldSpec = FieldSpec::new("description", FieldKind::Textarea).nullable();
const CAPACITY: FieldSpec = FieldSpec::new("capacity", FieldKind::Int).nullable();

pub static LIST: Schema = Schema {
    fields: &[
        ORG_ID,
        PAGE,
        PER_PAGE,
        LIMIT,
        OFFSET,
        FieldSpec::new("type", FieldKind::Text),
        FieldSpec::new("is_active", FieldKind::Bool),
        FieldSpec::new("search", FieldKind::Text).describe("matches name or description"),
    ],
    cross: &[],
};

pub static CREATE: Schema = Schema {
    fields: &[
        ORG_ID,
        FieldSpec::new("name", FieldKind::Text).required().validate(not_empty),
        DESCRIPTION,
        FieldSpec::new("type", FieldKind::Text).default(DefaultValue::Text("")),
        CAPACITY,
        FieldSpec::new("is_active", FieldKind::Bool).default(DefaultValue::Bool(true)),
    ],
    cross: &[],
};

pub static BY_ID: Schema = Schema {
    fields: &[ID],
    cross: &[],
};

pub static UPDATE: Schema = Schema {
    fields: &[
        ID,
        FieldSpec::new("name", FieldKind::Text).validate(not_empty),
        DESCRIPTION,
        FieldSpec::new("type", FieldKind::Text),
        CAPACITY,
        FieldSpec::new("is_active", FieldKind::Bool),
    ],
    cross: &[],
};

pub async fn list(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let filter = ResourceFilter {
        org_id: ctx.organization()?.org_id,
        resource_type: ctx.params.text("type").map(str::to_string),
        is_active: ctx.params.bool("is_active"),
        search: ctx.params.text("search").map(str::to_string),
    };

    let page = ctx.state.repos.resources.list(&filter, ctx.pagination()).await?;
    ApiResponse::ok("Resources retrieved.", page)
}

pub async fn create(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let params = &ctx.params;
    let new = NewResource {
        org_id: ctx.organization()?.org_id,
        name: params.require_text("name")?,
        description: params.text("description").map(str::to_string),
        resource_type: params.text("type").unwrap_or_default().to_string(),
        capacity: params.int("capacity"),
        is_active: params.bool("is_active").unwrap_or(true),
    };

    let resource = ctx.state.repos.resources.create(&new).await?;
    tracing::info!(resource_id = resource.resource_id, org_id = resource.org_id, "resource created");
    ApiResponse::created("Resource created.", resource)
}

pub async fn get(ctx: RequestCtx) -> AppResult<ApiResponse> {
    ApiResponse::ok("Resource retrieved.", ctx.resource()?)
}

pub async fn update(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let resource_id = ctx.resource()?.resource_id;
    let params = &ctx.params;
    let patch = ResourcePatch {
        name: params.text("name").map(str::to_string),
        description: params.patch_text("description"),
        resource_type: params.text("type").map(str::to_string),
        capacity: params.patch_int("capacity"),
        is_active: params.bool("is_active"),
    };

    let repo = &ctx.state.repos.resources;
    repo.update(resource_id, &patch).await?;

    let resource = repo
        .get_by_id(resource_id)
        .await?
        .ok_or_else(|| AppError::not_found("Resource not found."))?;
    ApiResponse::ok("Resource updated.", resource)
}

pub async fn delete(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let resource_id = ctx.resource()?.resource_id;
    ctx.state.repos.resources.delete(resource_id).await?;

    tracing::info!(resource_id, "resource deleted");
    ApiResponse::ok("Resource deleted.", serde_json::json!({ "resource_id": resource_id }))
}
