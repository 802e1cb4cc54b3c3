use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::organization::{DbOrganization, Organization};

#[utoipa::path(
    get,
    path = "/organizations",
    tag = "Organizations",
    responses((status = 200, description = "Organizations the principal may operate within", body = [Organization]))
)]
pub async fn list_accessible_organizations(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Organization>>> {
    let orgs = state.policy.accessible_organizations(&principal).await?;

    let placeholders = vec!["?"; orgs.len()].join(", ");
    let sql = format!(
        "SELECT id, name, parent_id, created_at, updated_at FROM organizations \
         WHERE id IN ({placeholders}) ORDER BY name"
    );

    let mut query = sqlx::query_as::<_, DbOrganization>(&sql);
    for org in &orgs {
        query = query.bind(*org);
    }

    let rows = query.fetch_all(&state.pool).await?;

    Ok(Json(rows.into_iter().map(Organization::from).collect()))
}
