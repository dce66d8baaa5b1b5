//! Role assignment and inheritance handlers.

use super::{Inserted, Removed};
use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use warden_authz::{DecisionContext, Domain, RoleAssignment, RoleInheritance, RoleName, UserId};

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub user: UserId,
    pub domain: Option<Domain>,
}

/// Body of the group and project scoped endpoints; the domain comes from the path.
#[derive(Debug, Deserialize)]
pub struct ScopedAssignment {
    pub user: UserId,
    pub role: RoleName,
}

/// Assignments of a user across domains, or the roles held in one domain.
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    let Query(query) = query?;
    let data = match &query.domain {
        Some(domain) => {
            let roles = state.enforcer.roles_for_user(&query.user, domain).await?;
            serde_json::json!({ "user": query.user, "domain": domain, "roles": roles })
        }
        None => {
            let assignments = state.enforcer.assignments_for_user(&query.user).await?;
            serde_json::json!({ "user": query.user, "assignments": assignments })
        }
    };
    Ok(ApiResponse::success(data))
}

pub async fn assign(
    State(state): State<AppState>,
    payload: Result<Json<RoleAssignment>, JsonRejection>,
) -> ApiResult<ApiResponse<Inserted>> {
    let Json(assignment) = payload?;
    let inserted = state.enforcer.assign_role(&assignment).await?;
    Ok(ApiResponse::success(Inserted { inserted }))
}

pub async fn unassign(
    State(state): State<AppState>,
    payload: Result<Json<RoleAssignment>, JsonRejection>,
) -> ApiResult<ApiResponse<Removed>> {
    let Json(assignment) = payload?;
    let removed = state.enforcer.unassign_role(&assignment).await?;
    Ok(ApiResponse::success(Removed { removed }))
}

pub async fn add_inheritance(
    State(state): State<AppState>,
    payload: Result<Json<RoleInheritance>, JsonRejection>,
) -> ApiResult<ApiResponse<Inserted>> {
    let Json(edge) = payload?;
    if edge.role == edge.parent {
        return Err(ApiError::BadRequest("a role cannot inherit from itself".into()));
    }
    let inserted = state.enforcer.add_role_inheritance(&edge).await?;
    Ok(ApiResponse::success(Inserted { inserted }))
}

pub async fn remove_inheritance(
    State(state): State<AppState>,
    payload: Result<Json<RoleInheritance>, JsonRejection>,
) -> ApiResult<ApiResponse<Removed>> {
    let Json(edge) = payload?;
    let removed = state.enforcer.remove_role_inheritance(&edge).await?;
    Ok(ApiResponse::success(Removed { removed }))
}

/// Assign a role inside the group or project the route resolved.
pub async fn assign_scoped(
    State(state): State<AppState>,
    Extension(context): Extension<DecisionContext>,
    payload: Result<Json<ScopedAssignment>, JsonRejection>,
) -> ApiResult<ApiResponse<Inserted>> {
    let Json(body) = payload?;
    let assignment = RoleAssignment::new(body.user, body.role, context.domain)?;
    let inserted = state.enforcer.assign_role(&assignment).await?;
    Ok(ApiResponse::success(Inserted { inserted }))
}

pub async fn unassign_scoped(
    State(state): State<AppState>,
    Extension(context): Extension<DecisionContext>,
    payload: Result<Json<ScopedAssignment>, JsonRejection>,
) -> ApiResult<ApiResponse<Removed>> {
    let Json(body) = payload?;
    let assignment = RoleAssignment::new(body.user, body.role, context.domain)?;
    let removed = state.enforcer.unassign_role(&assignment).await?;
    Ok(ApiResponse::success(Removed { removed }))
}
