//! Permission query handlers.

use crate::{
    error::ApiResult,
    middleware::Auth,
    response::ApiResponse,
    state::AppState,
};
use axum::extract::{rejection::QueryRejection, Query, State};
use serde::{Deserialize, Serialize};
use warden_authz::{Action, Domain, PermissionSet, Resource, UserId};

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub user: UserId,
    pub domain: Domain,
    pub resource: Resource,
    pub action: Action,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user: UserId,
    pub domain: Domain,
}

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Domain,
}

/// Decide an arbitrary request. Store errors surface as 500, never as `false`.
pub async fn check(
    State(state): State<AppState>,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<CheckResult>> {
    let Query(query) = query?;
    let allowed = state
        .enforcer
        .check(&query.user, &query.domain, &query.resource, &query.action)
        .await?;
    Ok(ApiResponse::success(CheckResult { allowed }))
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<PermissionSet>> {
    let Query(query) = query?;
    let permissions = state
        .enforcer
        .permissions_for(&query.user, &query.domain)
        .await?;
    Ok(ApiResponse::success(permissions))
}

/// The caller's own permissions; needs only authentication.
pub async fn me(
    State(state): State<AppState>,
    Auth(user): Auth,
    query: Result<Query<DomainQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<PermissionSet>> {
    let Query(query) = query?;
    let permissions = state.enforcer.permissions_for(&user.id, &query.domain).await?;
    Ok(ApiResponse::success(permissions))
}
