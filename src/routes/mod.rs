//! HTTP surface.
//!
//! Scheduling endpoints are declared once in [`route_table`] as
//! [`RouteDescriptor`]s and served through one dispatcher, which runs:
//! authentication (401), parameter normalization (400), authorization
//! (401/403/404), cross-field rules (400), then the handler.
//! Account and health endpoints are plain axum handlers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{on, MethodFilter};
use axum::Router;

use crate::app::AppState;
use crate::authz::{OrgPolicy, Principal};
use crate::db::Pagination;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::member::InternalRole;
use crate::models::organization::Organization;
use crate::models::resource::Resource;
use crate::models::shift::Shift;
use crate::validation::{ParamValue, Params, RawParams, Schema};

pub mod auth;
pub mod dashboard;
mod envelope;
pub mod health;
pub mod members;
pub mod organizations;
pub mod resources;
pub mod shifts;

pub use envelope::ApiResponse;

pub type HandlerFuture = Pin<Box<dyn Future<Output = AppResult<ApiResponse>> + Send>>;
pub type Handler = fn(RequestCtx) -> HandlerFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
        }
    }
}

/// Who may call a route. Scoped variants name the parameter carrying the
/// id; `min: None` only checks that the target exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    SiteAdmin,
    Org { param: &'static str, min: Option<InternalRole> },
    Resource { param: &'static str, min: Option<InternalRole> },
    Shift { param: &'static str, min: Option<InternalRole> },
}

pub struct RouteDescriptor {
    pub verb: Verb,
    /// axum path syntax, e.g. `/shifts/:id`.
    pub path: &'static str,
    pub tag: &'static str,
    pub summary: &'static str,
    pub schema: &'static Schema,
    pub access: Access,
    pub handler: Handler,
}

/// Entity the authorizer resolved for the request.
#[derive(Debug, Clone)]
pub enum Scope {
    Global,
    Organization(Organization),
    Resource(Resource),
    Shift(Shift),
}

impl Scope {
    /// Stored values in parameter form, the base for cross-field rules on updates.
    fn persisted(&self) -> Option<Params> {
        match self {
            Scope::Global | Scope::Organization(_) | Scope::Resource(_) => None,
            Scope::Shift(shift) => Some(
                Params::new()
                    .with("start_time", ParamValue::DateTime(shift.start_time))
                    .with("end_time", ParamValue::DateTime(shift.end_time))
                    .with("status", ParamValue::Text(shift.status.as_str().to_string())),
            ),
        }
    }
}

/// Everything a handler receives: injected state, the caller, typed
/// parameters and the authorized entity.
pub struct RequestCtx {
    pub state: AppState,
    pub principal: Principal,
    pub params: Params,
    pub scope: Scope,
    /// Caller's role in the scoped organization. `None` for site admins and global routes.
    pub role: Option<InternalRole>,
}

impl RequestCtx {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_params(&self.params, self.state.config.pages)
    }

    pub fn organization(&self) -> AppResult<&Organization> {
        match &self.scope {
            Scope::Organization(org) => Ok(org),
            _ => Err(AppError::internal("route is not organization scoped")),
        }
    }

    pub fn resource(&self) -> AppResult<&Resource> {
        match &self.scope {
            Scope::Resource(resource) => Ok(resource),
            _ => Err(AppError::internal("route is not resource scoped")),
        }
    }

    pub fn shift(&self) -> AppResult<&Shift> {
        match &self.scope {
            Scope::Shift(shift) => Ok(shift),
            _ => Err(AppError::internal("route is not shift scoped")),
        }
    }

    /// Whether the caller may act on `role`: site admins always, others only
    /// up to their own rank.
    pub fn may_manage(&self, role: InternalRole) -> bool {
        self.principal.is_site_admin() || self.role.is_some_and(|own| own.satisfies(role))
    }
}

macro_rules! handler {
    ($f:path) => {
        |ctx: RequestCtx| -> HandlerFuture { Box::pin($f(ctx)) }
    };
}

static ROUTES: LazyLock<Vec<RouteDescriptor>> = LazyLock::new(|| {
    use InternalRole::{Employee, OrgAdmin, Scheduler};

    vec![
        RouteDescriptor {
            verb: Verb::Get,
            path: "/organizations",
            tag: "Organizations",
            summary: "List organizations (all for site admins, own memberships otherwise)",
            schema: &organizations::LIST,
            access: Access::Authenticated,
            handler: handler!(organizations::list),
        },
        RouteDescriptor {
            verb: Verb::Post,
            path: "/organizations",
            tag: "Organizations",
            summary: "Create an organization",
            schema: &organizations::CREATE,
            access: Access::SiteAdmin,
            handler: handler!(organizations::create),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/organizations/:id",
            tag: "Organizations",
            summary: "Organization detail with the caller's roles",
            schema: &organizations::BY_ID,
            access: Access::Org { param: "id", min: Some(Employee) },
            handler: handler!(organizations::get),
        },
        RouteDescriptor {
            verb: Verb::Put,
            path: "/organizations/:id",
            tag: "Organizations",
            summary: "Update an organization; hierarchy changes need a site admin",
            schema: &organizations::UPDATE,
            access: Access::Org { param: "id", min: Some(OrgAdmin) },
            handler: handler!(organizations::update),
        },
        RouteDescriptor {
            verb: Verb::Delete,
            path: "/organizations/:id",
            tag: "Organizations",
            summary: "Delete an organization (not implemented)",
            schema: &organizations::BY_ID,
            access: Access::SiteAdmin,
            handler: handler!(organizations::delete),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/organization_members",
            tag: "Members",
            summary: "List members of an organization",
            schema: &members::LIST,
            access: Access::Org { param: "org_id", min: Some(Employee) },
            handler: handler!(members::list),
        },
        RouteDescriptor {
            verb: Verb::Post,
            path: "/organization_members",
            tag: "Members",
            summary: "Add a member",
            schema: &members::CREATE,
            access: Access::Org { param: "org_id", min: Some(Scheduler) },
            handler: handler!(members::create),
        },
        RouteDescriptor {
            verb: Verb::Put,
            path: "/organization_members/:user_id",
            tag: "Members",
            summary: "Update a member's roles",
            schema: &members::UPDATE,
            access: Access::Org { param: "org_id", min: Some(Scheduler) },
            handler: handler!(members::update),
        },
        RouteDescriptor {
            verb: Verb::Delete,
            path: "/organization_members/:user_id",
            tag: "Members",
            summary: "Remove a member",
            schema: &members::REMOVE,
            access: Access::Org { param: "org_id", min: Some(OrgAdmin) },
            handler: handler!(members::remove),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/resources",
            tag: "Resources",
            summary: "List resources of an organization",
            schema: &resources::LIST,
            access: Access::Org { param: "org_id", min: Some(Employee) },
            handler: handler!(resources::list),
        },
        RouteDescriptor {
            verb: Verb::Post,
            path: "/resources",
            tag: "Resources",
            summary: "Create a resource",
            schema: &resources::CREATE,
            access: Access::Org { param: "org_id", min: Some(Scheduler) },
            handler: handler!(resources::create),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/resources/:id",
            tag: "Resources",
            summary: "Resource detail",
            schema: &resources::BY_ID,
            access: Access::Resource { param: "id", min: Some(Employee) },
            handler: handler!(resources::get),
        },
        RouteDescriptor {
            verb: Verb::Put,
            path: "/resources/:id",
            tag: "Resources",
            summary: "Update a resource",
            schema: &resources::UPDATE,
            access: Access::Resource { param: "id", min: Some(Scheduler) },
            handler: handler!(resources::update),
        },
        RouteDescriptor {
            verb: Verb::Delete,
            path: "/resources/:id",
            tag: "Resources",
            summary: "Delete a resource",
            schema: &resources::BY_ID,
            access: Access::Resource { param: "id", min: Some(OrgAdmin) },
            handler: handler!(resources::delete),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/shifts",
            tag: "Shifts",
            summary: "List shifts of an organization",
            schema: &shifts::LIST,
            access: Access::Org { param: "org_id", min: Some(Employee) },
            handler: handler!(shifts::list),
        },
        RouteDescriptor {
            verb: Verb::Post,
            path: "/shifts",
            tag: "Shifts",
            summary: "Create a shift",
            schema: &shifts::CREATE,
            access: Access::Org { param: "org_id", min: Some(Scheduler) },
            handler: handler!(shifts::create),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/shifts/summary",
            tag: "Dashboard",
            summary: "Shift summary (placeholder)",
            schema: &Schema::EMPTY,
            access: Access::Authenticated,
            handler: handler!(dashboard::shift_summary),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/shifts/:id",
            tag: "Shifts",
            summary: "Shift detail",
            schema: &shifts::BY_ID,
            access: Access::Shift { param: "id", min: Some(Employee) },
            handler: handler!(shifts::get),
        },
        RouteDescriptor {
            verb: Verb::Put,
            path: "/shifts/:id",
            tag: "Shifts",
            summary: "Update a shift",
            schema: &shifts::UPDATE,
            access: Access::Shift { param: "id", min: Some(Scheduler) },
            handler: handler!(shifts::update),
        },
        RouteDescriptor {
            verb: Verb::Delete,
            path: "/shifts/:id",
            tag: "Shifts",
            summary: "Delete a shift",
            schema: &shifts::BY_ID,
            access: Access::Shift { param: "id", min: Some(Scheduler) },
            handler: handler!(shifts::delete),
        },
        RouteDescriptor {
            verb: Verb::Get,
            path: "/dashboard-stats",
            tag: "Dashboard",
            summary: "Dashboard counters (placeholder)",
            schema: &Schema::EMPTY,
            access: Access::Authenticated,
            handler: handler!(dashboard::stats),
        },
    ]
});

pub fn route_table() -> &'static [RouteDescriptor] {
    ROUTES.as_slice()
}

/// Mounts every descriptor on the router.
pub fn register(router: Router<AppState>) -> Router<AppState> {
    route_table().iter().fold(router, |router, route| {
        router.route(
            route.path,
            on(
                route.verb.filter(),
                move |State(state): State<AppState>,
                      caller: Caller,
                      path: Option<Path<HashMap<String, String>>>,
                      query: Option<Query<HashMap<String, String>>>,
                      body: Bytes| async move {
                    let path = path.map(|Path(path)| path).unwrap_or_default();
                    let query = query.map(|Query(query)| query).unwrap_or_default();
                    dispatch(route, state, caller, path, query, body).await
                },
            ),
        )
    })
}

async fn dispatch(
    route: &'static RouteDescriptor,
    state: AppState,
    caller: Caller,
    path: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
) -> AppResult<ApiResponse> {
    let principal = caller.require()?.clone();

    let raw = RawParams::from_request(path, query, &body)?;
    let params = route.schema.normalize(&raw)?;

    let (scope, role) = authorize(&state, &principal, route.access, &params).await?;

    let persisted = scope.persisted();
    route.schema.check_cross(&params, persisted.as_ref())?;

    tracing::debug!(
        method = route.verb.as_str(),
        path = route.path,
        user_id = principal.user_id,
        "dispatching"
    );

    (route.handler)(RequestCtx {
        state,
        principal,
        params,
        scope,
        role,
    })
    .await
}

async fn authorize(
    state: &AppState,
    principal: &Principal,
    access: Access,
    params: &Params,
) -> AppResult<(Scope, Option<InternalRole>)> {
    let policy = OrgPolicy::new(&state.repos);

    match access {
        Access::Authenticated => Ok((Scope::Global, None)),
        Access::SiteAdmin => {
            if principal.is_site_admin() {
                Ok((Scope::Global, None))
            } else {
                tracing::debug!(user_id = principal.user_id, code = "forbidden_site_admin", "access denied");
                Err(AppError::forbidden(
                    "forbidden_site_admin",
                    "This action requires a site administrator.",
                ))
            }
        }
        Access::Org { param, min } => {
            let org_id = params.require_int(param)?;
            let (org, role) = policy
                .resolve_org_access(Some(principal), org_id, min)
                .await?
                .into_result()?;
            Ok((Scope::Organization(org), role))
        }
        Access::Resource { param, min } => {
            let resource_id = params.require_int(param)?;
            let (resource, role) = policy
                .resolve_resource_access(Some(principal), resource_id, min)
                .await?
                .into_result()?;
            Ok((Scope::Resource(resource), role))
        }
        Access::Shift { param, min } => {
            let shift_id = params.require_int(param)?;
            let (shift, role) = policy
                .resolve_shift_access(Some(principal), shift_id, min)
                .await?
                .into_result()?;
            Ok((Scope::Shift(shift), role))
        }
    }
}
