use super::{ApiResponse, RequestCtx};
use crate::errors::{AppError, AppResult};
use crate::models::member::{InternalRole, MemberFilter, MemberPatch, NewMember};
use crate::models::plugin_role::ELIGIBLE_CAPABILITY;
use crate::validation::{DefaultValue, FieldKind, FieldSpec, Schema, LIMIT, OFFSET, PAGE, PER_PAGE};

const ORG_ID: FieldSpec = FieldSpec::new("org_id", FieldKind::Id).required().describe("organization id");
const USER_ID: FieldSpec = FieldSpec::new("user_id", FieldKind::Id).required().describe("member's user id");
const ROLE: FieldSpec = FieldSpec::new("internal_role", FieldKind::Enum(&InternalRole::ALL));
const EMPLOYMENT_NUMBER: FieldSpec = FieldSpec::new("employment_number", FieldKind::Text).nullable();
const PLUGIN_ROLES: FieldSpec = FieldSpec::new("plugin_roles", FieldKind::KeyList)
    .describe("replaces the member's plugin roles; requires the schema_user capability");

pub static LIST: Schema = Schema {
    fields: &[
        ORG_ID,
        PAGE,
        PER_PAGE,
        LIMIT,
        OFFSET,
        ROLE,
        FieldSpec::new("search", FieldKind::Text).describe("matches name, email or employment number"),
    ],
    cross: &[],
};

pub static CREATE: Schema = Schema {
    fields: &[
        ORG_ID,
        USER_ID,
        ROLE.default(DefaultValue::Text("employee")),
        EMPLOYMENT_NUMBER,
        PLUGIN_ROLES,
    ],
    cross: &[],
};

pub static UPDATE: Schema = Schema {
    fields: &[ORG_ID, USER_ID, ROLE, EMPLOYMENT_NUMBER, PLUGIN_ROLES],
    cross: &[],
};

pub static REMOVE: Schema = Schema {
    fields: &[ORG_ID, USER_ID],
    cross: &[],
};

pub async fn list(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let filter = MemberFilter {
        org_id: ctx.organization()?.org_id,
        internal_role: ctx.params.parsed("internal_role")?,
        search: ctx.params.text("search").map(str::to_string),
    };

    let page = ctx.state.repos.members.list(&filter, ctx.pagination()).await?;
    ApiResponse::ok("Members retrieved.", page)
}

pub async fn create(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let org_id = ctx.organization()?.org_id;
    let user_id = ctx.params.require_int("user_id")?;
    let internal_role: InternalRole = ctx.params.parsed("internal_role")?.unwrap_or_default();

    if !ctx.state.identity.user_exists(user_id).await? {
        return Err(AppError::not_found("User not found."));
    }
    ensure_may_assign(&ctx, internal_role)?;

    let plugin_roles = ctx.params.list("plugin_roles");
    ensure_eligible(&ctx, user_id, plugin_roles).await?;

    let members = &ctx.state.repos.members;
    if members.role_of(org_id, user_id).await?.is_some() {
        return Err(AppError::conflict("The user is already a member of this organization."));
    }

    let member = members
        .create(
            &NewMember {
                org_id,
                user_id,
                internal_role,
                employment_number: ctx.params.text("employment_number").map(str::to_string),
            },
            plugin_roles,
        )
        .await?;

    tracing::info!(org_id, user_id, role = %internal_role, "member added");
    ApiResponse::created("Member added.", member)
}

pub async fn update(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let org_id = ctx.organization()?.org_id;
    let user_id = ctx.params.require_int("user_id")?;
    let members = &ctx.state.repos.members;

    let current = members
        .role_of(org_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found."))?;
    ensure_may_assign(&ctx, current)?;

    let patch = MemberPatch {
        internal_role: ctx.params.parsed("internal_role")?,
        employment_number: ctx.params.patch_text("employment_number"),
    };
    if let Some(role) = patch.internal_role {
        ensure_may_assign(&ctx, role)?;
    }

    let plugin_roles = ctx.params.list("plugin_roles");
    ensure_eligible(&ctx, user_id, plugin_roles).await?;

    members.update(org_id, user_id, &patch, plugin_roles).await?;

    let member = members
        .get(org_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found."))?;
    ApiResponse::ok("Member updated.", member)
}

pub async fn remove(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let org_id = ctx.organization()?.org_id;
    let user_id = ctx.params.require_int("user_id")?;

    if user_id == ctx.principal.user_id {
        return Err(AppError::forbidden(
            "cannot_remove_self",
            "You cannot remove yourself from an organization.",
        ));
    }

    let members = &ctx.state.repos.members;
    let current = members
        .role_of(org_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found."))?;
    ensure_may_assign(&ctx, current)?;

    members.remove(org_id, user_id).await?;

    tracing::info!(org_id, user_id, "member removed");
    ApiResponse::ok("Member removed.", serde_json::json!({ "org_id": org_id, "user_id": user_id }))
}

fn ensure_may_assign(ctx: &RequestCtx, role: InternalRole) -> AppResult<()> {
    if ctx.may_manage(role) {
        return Ok(());
    }
    tracing::debug!(user_id = ctx.principal.user_id, role = %role, code = "role_escalation", "access denied");
    Err(AppError::forbidden(
        "role_escalation",
        "You cannot manage members above your own role.",
    ))
}

/// Plugin roles may only be granted to users holding the eligibility capability.
async fn ensure_eligible(ctx: &RequestCtx, user_id: i64, plugin_roles: Option<&[String]>) -> AppResult<()> {
    let Some(roles) = plugin_roles.filter(|roles| !roles.is_empty()) else {
        return Ok(());
    };

    if ctx.state.identity.has_capability(user_id, ELIGIBLE_CAPABILITY).await? {
        return Ok(());
    }

    tracing::debug!(user_id, roles = ?roles, "plugin roles refused for ineligible user");
    Err(AppError::bad_request(
        "user_not_eligible",
        "The user is not eligible for plugin roles.",
    ))
}
