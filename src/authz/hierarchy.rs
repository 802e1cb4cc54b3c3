use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::principal::{Principal, Role};
use super::AuthzError;

/// A direct child of some organization, as reported by the directory.
#[derive(Debug, Clone)]
pub struct ChildOrganization {
    pub id: Uuid,
    pub parent_id: Uuid,
}

/// Read-only lookup of direct child organizations.
///
/// Injected into the resolver so the policy can be tested against an
/// in-memory fixture; the single method is the only I/O the authorization
/// layer performs.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn find_direct_children(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ChildOrganization>, AuthzError>;
}

/// Directory backed by the service's SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteOrganizationDirectory {
    pool: SqlitePool,
}

impl SqliteOrganizationDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationDirectory for SqliteOrganizationDirectory {
    async fn find_direct_children(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ChildOrganization>, AuthzError> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, parent_id FROM organizations WHERE parent_id = ?",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, parent_id)| ChildOrganization { id, parent_id })
            .collect())
    }
}

/// Compute the set of organization ids the principal may operate within.
///
/// The principal's own organization is always included. Owners additionally
/// see every direct child of their organization; children of children are
/// not resolved. Admins and viewers see only their own organization.
///
/// A failed directory lookup propagates as [`AuthzError::Infrastructure`];
/// it is never collapsed into "no children".
pub async fn accessible_organizations(
    principal: &Principal,
    directory: &dyn OrganizationDirectory,
) -> Result<HashSet<Uuid>, AuthzError> {
    let mut orgs = HashSet::new();
    orgs.insert(principal.organization_id);

    if principal.role == Role::Owner {
        for child in directory
            .find_direct_children(principal.organization_id)
            .await?
        {
            orgs.insert(child.id);
        }
    }

    Ok(orgs)
}
