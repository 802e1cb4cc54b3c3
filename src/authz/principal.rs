use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The three roles a user can hold. Closed set.
///
/// Deliberately not `Ord`: the create rule treats Owner and Admin the same
/// while the modify rule does not, so the rules are not monotonic in any
/// single ranking. Each policy rule matches on the tag directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }
}

/// The authenticated caller of an operation.
///
/// Built exactly once per request from verified JWT claims and passed
/// explicitly into every decision; the role and home organization are never
/// re-read from request payloads.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub organization_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, organization_id: Uuid) -> Self {
        Self {
            user_id,
            role,
            organization_id,
        }
    }
}
