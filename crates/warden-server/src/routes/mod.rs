//! Route configuration for the Warden API server.

mod internal;
mod v1;

use crate::{error::ApiError, middleware::PrincipalLayer, state::AppState};
use anyhow::{Context, Result};
use axum::{
    http::{HeaderName, Uri},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router.
pub fn create_router(state: AppState) -> Result<Router> {
    let principal_header = HeaderName::try_from(state.config.authz.principal_header.as_str())
        .context("Invalid authz.principal_header")?;

    // Common middleware stack applied to all routes
    let common_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(state.config.server.request_timeout()))
        .layer(PrincipalLayer::new(principal_header));

    Ok(Router::new()
        .nest("/api/v1", v1::router(&state))
        .nest("/internal", internal::router())
        .fallback(fallback_handler)
        .layer(common_middleware)
        .with_state(state))
}

async fn fallback_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {}", uri.path()))
}
