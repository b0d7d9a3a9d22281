//! Authorization engine
//!
//! Two tiers decide every request:
//! - a site-wide standing from the identity provider (site admin, capabilities)
//! - a hierarchical role held per organization (employee < scheduler < org_admin)
//!
//! Resources and shifts carry no ACL of their own; their owning organization decides.

mod evaluator;
mod principal;

pub use evaluator::{Decision, Denial, MembershipSource, OrgPolicy, Scoped};
pub use principal::Principal;
