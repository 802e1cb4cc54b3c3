//! Authorization module - Hierarchy Resolver and Task Access Policy
//!
//! Decides, per request, whether a principal may view, create, modify, or
//! delete a task. Read access is hierarchy-wide for every role; write access
//! is asymmetric: owners reach direct child organizations, admins stay inside
//! their own organization, viewers never write.

mod hierarchy;
mod policy;
mod principal;

pub use hierarchy::{
    accessible_organizations, ChildOrganization, OrganizationDirectory,
    SqliteOrganizationDirectory,
};
pub use policy::TaskPolicy;
pub use principal::{Principal, Role};

/// Failure of the organization-store lookup the resolver depends on.
///
/// Policy decisions themselves never fail; a denial is a plain `false`. When
/// this error surfaces, the caller must abort the authorization decision
/// rather than treat the missing result as an empty set.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("organization lookup failed: {0}")]
    Infrastructure(String),
}

impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infrastructure(err.to_string())
    }
}
