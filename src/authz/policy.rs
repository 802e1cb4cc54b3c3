use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::models::task::Task;

use super::hierarchy::{accessible_organizations, OrganizationDirectory};
use super::principal::{Principal, Role};
use super::AuthzError;

/// Task access decisions for a (principal, task, action) triple.
///
/// Stateless: every method is a pure function of its inputs plus a single
/// read-only children lookup through the injected directory. Denial is a
/// `false` result; only the directory lookup can fail.
#[derive(Clone)]
pub struct TaskPolicy {
    directory: Arc<dyn OrganizationDirectory>,
}

impl TaskPolicy {
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self { directory }
    }

    /// The set of organization ids the principal may operate within.
    pub async fn accessible_organizations(
        &self,
        principal: &Principal,
    ) -> Result<HashSet<Uuid>, AuthzError> {
        accessible_organizations(principal, self.directory.as_ref()).await
    }

    /// Read permission: the task's organization must be in the principal's
    /// accessible set. Applies uniformly to every role.
    pub async fn can_read(&self, principal: &Principal, task: &Task) -> Result<bool, AuthzError> {
        let orgs = self.accessible_organizations(principal).await?;
        let allowed = orgs.contains(&task.organization_id);

        tracing::debug!(
            user_id = %principal.user_id,
            role = principal.role.as_str(),
            task_id = %task.id,
            allowed,
            "read decision"
        );

        Ok(allowed)
    }

    /// Create permission: owners and admins only. No hierarchy check; a new
    /// task is always stamped with the principal's own organization.
    pub fn can_create(&self, principal: &Principal) -> bool {
        matches!(principal.role, Role::Owner | Role::Admin)
    }

    /// Write permission, covering both update and delete.
    ///
    /// Owners reach every task in their accessible set (own org plus direct
    /// children); admins only tasks in their own organization, even when an
    /// owner above them could reach further; viewers never write.
    pub async fn can_modify(&self, principal: &Principal, task: &Task) -> Result<bool, AuthzError> {
        let allowed = match principal.role {
            Role::Owner => {
                let orgs = self.accessible_organizations(principal).await?;
                orgs.contains(&task.organization_id)
            }
            Role::Admin => task.organization_id == principal.organization_id,
            Role::Viewer => false,
        };

        tracing::debug!(
            user_id = %principal.user_id,
            role = principal.role.as_str(),
            task_id = %task.id,
            allowed,
            "modify decision"
        );

        Ok(allowed)
    }
}
