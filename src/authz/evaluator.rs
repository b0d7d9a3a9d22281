use async_trait::async_trait;

use super::principal::Principal;
use crate::errors::{AppError, AppResult};
use crate::models::member::InternalRole;
use crate::models::organization::Organization;
use crate::models::resource::Resource;
use crate::models::shift::Shift;

/// Lookups the policy needs. Implemented by the repository layer; tests
/// supply an in-memory fake.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn find_organization(&self, org_id: i64) -> AppResult<Option<Organization>>;
    async fn member_role(&self, org_id: i64, user_id: i64) -> AppResult<Option<InternalRole>>;
    async fn find_resource(&self, resource_id: i64) -> AppResult<Option<Resource>>;
    async fn find_shift(&self, shift_id: i64) -> AppResult<Option<Shift>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotLoggedIn,
    NotFound,
    ForbiddenMember,
    ForbiddenRole,
}

impl Denial {
    pub fn code(self) -> &'static str {
        match self {
            Denial::NotLoggedIn => "not_logged_in",
            Denial::NotFound => "not_found",
            Denial::ForbiddenMember => "forbidden_member",
            Denial::ForbiddenRole => "forbidden_role",
        }
    }
}

impl From<Denial> for AppError {
    fn from(value: Denial) -> Self {
        match value {
            Denial::NotLoggedIn => AppError::unauthenticated("You are not currently logged in."),
            Denial::NotFound => AppError::not_found("The requested item was not found."),
            Denial::ForbiddenMember => {
                AppError::forbidden(value.code(), "You are not a member of this organization.")
            }
            Denial::ForbiddenRole => AppError::forbidden(
                value.code(),
                "Your role in this organization does not allow this action.",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Outcome of an organization-scoped check together with what was loaded
/// on the way. `entity` is present whenever the target exists.
#[derive(Debug, Clone)]
pub struct Scoped<T> {
    pub decision: Decision,
    pub entity: Option<T>,
    /// Caller's membership role in the owning organization, when looked up.
    pub role: Option<InternalRole>,
}

impl<T> Scoped<T> {
    fn denied(denial: Denial, entity: Option<T>) -> Self {
        Self {
            decision: Decision::Deny(denial),
            entity,
            role: None,
        }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Scoped<U> {
        Scoped {
            decision: self.decision,
            entity: self.entity.map(f),
            role: self.role,
        }
    }

    /// Allowed entity plus caller role, or the denial as an error.
    pub fn into_result(self) -> AppResult<(T, Option<InternalRole>)> {
        match (self.decision, self.entity) {
            (Decision::Allow, Some(entity)) => Ok((entity, self.role)),
            (Decision::Deny(denial), _) => Err(denial.into()),
            (Decision::Allow, None) => Err(Denial::NotFound.into()),
        }
    }
}

/// Organization-role policy. Access to resources and shifts is always
/// decided by the role held in the owning organization.
pub struct OrgPolicy<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: MembershipSource + ?Sized> OrgPolicy<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Evaluation order:
    /// 1. no caller -> 401
    /// 2. unknown organization -> 404
    /// 3. no minimum role -> allow
    /// 4. site admin -> allow
    /// 5. no membership -> 403 forbidden_member
    /// 6. rank below minimum -> 403 forbidden_role
    pub async fn resolve_org_access(
        &self,
        caller: Option<&Principal>,
        org_id: i64,
        min_role: Option<InternalRole>,
    ) -> AppResult<Scoped<Organization>> {
        let Some(principal) = caller else {
            return Ok(Scoped::denied(Denial::NotLoggedIn, None));
        };

        let Some(org) = self.source.find_organization(org_id).await? else {
            tracing::debug!(user_id = principal.user_id, org_id, code = Denial::NotFound.code(), "access denied");
            return Ok(Scoped::denied(Denial::NotFound, None));
        };

        self.decide(principal, org, min_role).await
    }

    pub async fn resolve_resource_access(
        &self,
        caller: Option<&Principal>,
        resource_id: i64,
        min_role: Option<InternalRole>,
    ) -> AppResult<Scoped<Resource>> {
        let Some(principal) = caller else {
            return Ok(Scoped::denied(Denial::NotLoggedIn, None));
        };

        let Some(resource) = self.source.find_resource(resource_id).await? else {
            return Ok(Scoped::denied(Denial::NotFound, None));
        };

        let Some(org) = self.source.find_organization(resource.org_id).await? else {
            return Ok(Scoped::denied(Denial::NotFound, None));
        };

        let scoped = self.decide(principal, org, min_role).await?;
        Ok(scoped.map(|_| resource))
    }

    pub async fn resolve_shift_access(
        &self,
        caller: Option<&Principal>,
        shift_id: i64,
        min_role: Option<InternalRole>,
    ) -> AppResult<Scoped<Shift>> {
        let Some(principal) = caller else {
            return Ok(Scoped::denied(Denial::NotLoggedIn, None));
        };

        let Some(shift) = self.source.find_shift(shift_id).await? else {
            return Ok(Scoped::denied(Denial::NotFound, None));
        };

        let Some(org) = self.source.find_organization(shift.org_id).await? else {
            return Ok(Scoped::denied(Denial::NotFound, None));
        };

        let scoped = self.decide(principal, org, min_role).await?;
        Ok(scoped.map(|_| shift))
    }

    async fn decide(
        &self,
        principal: &Principal,
        org: Organization,
        min_role: Option<InternalRole>,
    ) -> AppResult<Scoped<Organization>> {
        let org_id = org.org_id;

        let Some(min_role) = min_role else {
            return Ok(Scoped {
                decision: Decision::Allow,
                entity: Some(org),
                role: None,
            });
        };

        if principal.is_site_admin() {
            tracing::debug!(user_id = principal.user_id, org_id, "site admin bypass");
            return Ok(Scoped {
                decision: Decision::Allow,
                entity: Some(org),
                role: None,
            });
        }

        let Some(role) = self.source.member_role(org_id, principal.user_id).await? else {
            tracing::debug!(
                user_id = principal.user_id,
                org_id,
                code = Denial::ForbiddenMember.code(),
                "access denied"
            );
            return Ok(Scoped::denied(Denial::ForbiddenMember, Some(org)));
        };

        if !role.satisfies(min_role) {
            tracing::debug!(
                user_id = principal.user_id,
                org_id,
                role = %role,
                required = %min_role,
                code = Denial::ForbiddenRole.code(),
                "access denied"
            );
            return Ok(Scoped {
                decision: Decision::Deny(Denial::ForbiddenRole),
                entity: Some(org),
                role: Some(role),
            });
        }

        tracing::debug!(user_id = principal.user_id, org_id, role = %role, "access granted");
        Ok(Scoped {
            decision: Decision::Allow,
            entity: Some(org),
            role: Some(role),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::shift::ShiftStatus;

    #[derive(Default)]
    struct FakeSource {
        orgs: Vec<i64>,
        roles: HashMap<(i64, i64), InternalRole>,
        resources: HashMap<i64, i64>,
        shifts: HashMap<i64, i64>,
    }

    fn org(org_id: i64) -> Organization {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Organization {
            org_id,
            name: format!("Org {org_id}"),
            parent_org_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[async_trait]
    impl MembershipSource for FakeSource {
        async fn find_organization(&self, org_id: i64) -> AppResult<Option<Organization>> {
            Ok(self.orgs.contains(&org_id).then(|| org(org_id)))
        }

        async fn member_role(&self, org_id: i64, user_id: i64) -> AppResult<Option<InternalRole>> {
            Ok(self.roles.get(&(org_id, user_id)).copied())
        }

        async fn find_resource(&self, resource_id: i64) -> AppResult<Option<Resource>> {
            let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            Ok(self.resources.get(&resource_id).map(|org_id| Resource {
                resource_id,
                org_id: *org_id,
                name: "Room".into(),
                description: None,
                resource_type: "room".into(),
                capacity: None,
                is_active: true,
                created_at: at,
                updated_at: at,
            }))
        }

        async fn find_shift(&self, shift_id: i64) -> AppResult<Option<Shift>> {
            let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
            Ok(self.shifts.get(&shift_id).map(|org_id| Shift {
                shift_id,
                org_id: *org_id,
                resource_id: None,
                user_id: None,
                start_time: at,
                end_time: at + chrono::Duration::hours(8),
                title: None,
                notes: None,
                status: ShiftStatus::Pending,
                created_at: at,
                updated_at: at,
            }))
        }
    }

    fn source() -> FakeSource {
        let mut source = FakeSource {
            orgs: vec![1, 2],
            ..Default::default()
        };
        source.roles.insert((1, 10), InternalRole::Employee);
        source.roles.insert((1, 11), InternalRole::Scheduler);
        source.roles.insert((1, 12), InternalRole::OrgAdmin);
        source.resources.insert(100, 1);
        source.shifts.insert(200, 2);
        source
    }

    #[tokio::test]
    async fn anonymous_caller_is_not_logged_in() {
        let source = source();
        let policy = OrgPolicy::new(&source);
        let scoped = policy.resolve_org_access(None, 1, None).await.unwrap();
        assert_eq!(scoped.decision, Decision::Deny(Denial::NotLoggedIn));
    }

    #[tokio::test]
    async fn missing_organization_is_not_found_even_for_admins() {
        let source = source();
        let policy = OrgPolicy::new(&source);
        let admin = Principal::new(1).as_site_admin();
        let scoped = policy
            .resolve_org_access(Some(&admin), 99, Some(InternalRole::Employee))
            .await
            .unwrap();
        assert_eq!(scoped.decision, Decision::Deny(Denial::NotFound));
    }

    #[tokio::test]
    async fn role_rank_decides_access() {
        let source = source();
        let policy = OrgPolicy::new(&source);

        for (user_id, role) in [(10, InternalRole::Employee), (11, InternalRole::Scheduler), (12, InternalRole::OrgAdmin)] {
            let caller = Principal::new(user_id);
            for min in [InternalRole::Employee, InternalRole::Scheduler, InternalRole::OrgAdmin] {
                let scoped = policy.resolve_org_access(Some(&caller), 1, Some(min)).await.unwrap();
                assert_eq!(scoped.decision.is_allowed(), role.rank() >= min.rank(), "{role} vs {min}");
            }
        }
    }

    #[tokio::test]
    async fn non_member_is_forbidden_for_any_min_role() {
        let source = source();
        let policy = OrgPolicy::new(&source);
        let outsider = Principal::new(50);
        let scoped = policy
            .resolve_org_access(Some(&outsider), 2, Some(InternalRole::Employee))
            .await
            .unwrap();
        assert_eq!(scoped.decision, Decision::Deny(Denial::ForbiddenMember));

        let existence_only = policy.resolve_org_access(Some(&outsider), 2, None).await.unwrap();
        assert!(existence_only.decision.is_allowed());
    }

    #[tokio::test]
    async fn site_admin_bypasses_membership() {
        let source = source();
        let policy = OrgPolicy::new(&source);
        let admin = Principal::new(77).as_site_admin();
        let scoped = policy
            .resolve_org_access(Some(&admin), 2, Some(InternalRole::OrgAdmin))
            .await
            .unwrap();
        assert!(scoped.decision.is_allowed());
    }

    #[tokio::test]
    async fn resource_access_follows_owning_organization() {
        let source = source();
        let policy = OrgPolicy::new(&source);

        let scheduler = Principal::new(11);
        let (resource, role) = policy
            .resolve_resource_access(Some(&scheduler), 100, Some(InternalRole::Scheduler))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(resource.org_id, 1);
        assert_eq!(role, Some(InternalRole::Scheduler));

        let missing = policy
            .resolve_resource_access(Some(&scheduler), 404, Some(InternalRole::Employee))
            .await
            .unwrap();
        assert_eq!(missing.decision, Decision::Deny(Denial::NotFound));
    }

    #[tokio::test]
    async fn shift_in_foreign_organization_is_forbidden() {
        let source = source();
        let policy = OrgPolicy::new(&source);
        let scoped = policy
            .resolve_shift_access(Some(&Principal::new(12)), 200, Some(InternalRole::Employee))
            .await
            .unwrap();
        assert_eq!(scoped.decision, Decision::Deny(Denial::ForbiddenMember));
        assert!(matches!(scoped.into_result(), Err(AppError::Forbidden { .. })));
    }
}
