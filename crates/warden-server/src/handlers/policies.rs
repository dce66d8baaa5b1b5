//! Policy grant handlers.

use super::{Inserted, Removed};
use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use warden_authz::{Domain, PolicyRule, Subject};

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub policies: Vec<PolicyRule>,
}

#[derive(Debug, Serialize)]
pub struct BatchInserted {
    pub requested: usize,
    pub inserted: usize,
}

#[derive(Debug, Deserialize)]
pub struct PolicyFilter {
    pub subject: Option<Subject>,
    pub domain: Option<Domain>,
}

#[derive(Debug, Serialize)]
pub struct Reloaded {
    pub reloaded: bool,
    pub policies: usize,
}

pub async fn list(
    State(state): State<AppState>,
    filter: Result<Query<PolicyFilter>, QueryRejection>,
) -> ApiResult<ApiResponse<Vec<PolicyRule>>> {
    let Query(filter) = filter?;
    let policies = match filter.subject {
        Some(subject) => {
            state
                .enforcer
                .policies_for_subject(&subject, filter.domain.as_ref())
                .await?
        }
        None => {
            let mut all = state.enforcer.all_policies().await?;
            if let Some(domain) = &filter.domain {
                all.retain(|rule| rule.domain.matches(domain));
            }
            all
        }
    };
    Ok(ApiResponse::success(policies))
}

pub async fn grant(
    State(state): State<AppState>,
    payload: Result<Json<PolicyRule>, JsonRejection>,
) -> ApiResult<ApiResponse<Inserted>> {
    let Json(rule) = payload?;
    let inserted = state.enforcer.grant(&rule).await?;
    Ok(ApiResponse::success(Inserted { inserted }))
}

pub async fn revoke(
    State(state): State<AppState>,
    payload: Result<Json<PolicyRule>, JsonRejection>,
) -> ApiResult<ApiResponse<Removed>> {
    let Json(rule) = payload?;
    let removed = state.enforcer.revoke(&rule).await?;
    Ok(ApiResponse::success(Removed { removed }))
}

pub async fn grant_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<BatchInserted>> {
    let Json(batch) = payload?;
    if batch.policies.is_empty() {
        return Err(ApiError::BadRequest("policies must not be empty".into()));
    }

    let inserted = state.enforcer.grant_batch(&batch.policies).await?;
    Ok(ApiResponse::success(BatchInserted {
        requested: batch.policies.len(),
        inserted,
    }))
}

pub async fn reload(State(state): State<AppState>) -> ApiResult<ApiResponse<Reloaded>> {
    state.enforcer.reload().await?;
    let policies = state.enforcer.all_policies().await?.len();
    Ok(ApiResponse::success(Reloaded {
        reloaded: true,
        policies,
    }))
}
