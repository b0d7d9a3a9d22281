use super::{ApiResponse, RequestCtx};
use crate::errors::{AppError, AppResult};
use crate::models::organization::{NewOrganization, OrganizationDetail, OrganizationFilter, OrganizationPatch};
use crate::validation::{
    not_empty, CrossRule, FieldKind, FieldSpec, Params, Schema, LIMIT, OFFSET, PAGE, PER_PAGE,
};

const ID: FieldSpec = FieldSpec::new("id", FieldKind::Id).required().describe("organization id");
const PARENT: FieldSpec = FieldSpec::new("parent_org_id", FieldKind::Id)
    .nullable()
    .describe("parent organization; null detaches");

pub static LIST: Schema = Schema {
    fields: &[
        PAGE,
        PER_PAGE,
        LIMIT,
        OFFSET,
        FieldSpec::new("parent_org_id", FieldKind::Id).describe("only children of this organization"),
        FieldSpec::new("search", FieldKind::Text).describe("partial, case-insensitive name match"),
    ],
    cross: &[],
};

pub static CREATE: Schema = Schema {
    fields: &[
        FieldSpec::new("name", FieldKind::Text).required().validate(not_empty),
        PARENT,
    ],
    cross: &[],
};

pub static BY_ID: Schema = Schema {
    fields: &[ID],
    cross: &[],
};

pub static UPDATE: Schema = Schema {
    fields: &[ID, FieldSpec::new("name", FieldKind::Text).validate(not_empty), PARENT],
    cross: &[CrossRule {
        param: "parent_org_id",
        triggers: &["parent_org_id"],
        code: Some("self_parent"),
        check: not_own_parent,
    }],
};

fn not_own_parent(params: &Params) -> Result<(), String> {
    match (params.int("id"), params.int("parent_org_id")) {
        (Some(id), Some(parent)) if id == parent => {
            Err("An organization cannot be its own parent.".to_string())
        }
        _ => Ok(()),
    }
}

pub async fn list(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let filter = OrganizationFilter {
        member_user_id: (!ctx.principal.is_site_admin()).then_some(ctx.principal.user_id),
        parent_org_id: ctx.params.int("parent_org_id"),
        search: ctx.params.text("search").map(str::to_string),
    };

    let page = ctx
        .state
        .repos
        .organizations
        .list(&filter, ctx.pagination())
        .await?;
    ApiResponse::ok("Organizations retrieved.", page)
}

pub async fn create(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let parent_org_id = ctx.params.int("parent_org_id");
    if let Some(parent) = parent_org_id {
        ensure_parent_exists(&ctx, parent).await?;
    }

    let org = ctx
        .state
        .repos
        .organizations
        .create(&NewOrganization {
            name: ctx.params.require_text("name")?,
            parent_org_id,
        })
        .await?;

    tracing::info!(org_id = org.org_id, user_id = ctx.principal.user_id, "organization created");
    ApiResponse::created("Organization created.", org)
}

pub async fn get(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let org = ctx.organization()?.clone();
    let repos = &ctx.state.repos;

    let internal_role = match ctx.role {
        Some(role) => Some(role),
        None => repos.members.role_of(org.org_id, ctx.principal.user_id).await?,
    };
    let plugin_roles = repos
        .plugin_roles
        .for_member(org.org_id, ctx.principal.user_id)
        .await?;

    ApiResponse::ok(
        "Organization retrieved.",
        OrganizationDetail {
            organization: org,
            internal_role,
            plugin_roles,
        },
    )
}

pub async fn update(ctx: RequestCtx) -> AppResult<ApiResponse> {
    let current = ctx.organization()?;
    let org_id = current.org_id;
    let patch = OrganizationPatch {
        name: ctx.params.text("name").map(str::to_string),
        // restating the stored parent is not a hierarchy change
        parent_org_id: ctx
            .params
            .patch_int("parent_org_id")
            .filter(|parent| *parent != current.parent_org_id),
    };

    if let Some(parent) = patch.parent_org_id {
        if !ctx.principal.is_site_admin() {
            return Err(AppError::forbidden(
                "hierarchy_requires_site_admin",
                "Only site administrators can change the organization hierarchy.",
            ));
        }
        if let Some(parent) = parent {
            check_new_parent(&ctx, org_id, parent).await?;
        }
    }

    let repo = &ctx.state.repos.organizations;
    repo.update(org_id, &patch).await?;

    let org = repo
        .get_by_id(org_id)
        .await?
        .ok_or_else(|| AppError::not_found("Organization not found."))?;
    ApiResponse::ok("Organization updated.", org)
}

pub async fn delete(_ctx: RequestCtx) -> AppResult<ApiResponse> {
    Err(AppError::not_implemented("Deleting organizations is not implemented."))
}

async fn ensure_parent_exists(ctx: &RequestCtx, parent: i64) -> AppResult<()> {
    match ctx.state.repos.organizations.get_by_id(parent).await? {
        Some(_) => Ok(()),
        None => Err(AppError::bad_request(
            "invalid_parent",
            "The parent organization does not exist.",
        )),
    }
}

/// A parent must exist and not sit below the organization.
async fn check_new_parent(ctx: &RequestCtx, org_id: i64, parent: i64) -> AppResult<()> {
    ensure_parent_exists(ctx, parent).await?;

    let ancestors = ctx.state.repos.organizations.ancestor_ids(parent).await?;
    if ancestors.contains(&org_id) {
        return Err(AppError::bad_request(
            "parent_cycle",
            "The new parent is a descendant of this organization.",
        ));
    }
    Ok(())
}
