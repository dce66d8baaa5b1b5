//! Authorization middleware layer.

use crate::{error::ApiError, middleware::auth::types::AuthUser};
use axum::{
    body::Body,
    extract::{FromRequestParts, OriginalUri, Path, Query},
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use warden_authz::{Action, AuthzGuard, Outcome, RequestInfo, Resource, RouteRule};

/// Authorization layer configuration.
#[derive(Clone)]
pub struct AuthzLayer {
    guard: AuthzGuard,
    rule: Arc<RouteRule>,
}

impl AuthzLayer {
    pub fn new(guard: AuthzGuard, rule: RouteRule) -> Self {
        Self {
            guard,
            rule: Arc::new(rule),
        }
    }

    /// Check against the `system` domain.
    pub fn system(guard: AuthzGuard) -> Self {
        Self::new(guard, RouteRule::system())
    }

    /// Check against `group:<id>` taken from the path or `group_id` query.
    pub fn group(guard: AuthzGuard) -> Self {
        Self::new(guard, RouteRule::group())
    }

    /// Check against `project:<id>` taken from the path or `project_id` query.
    pub fn project(guard: AuthzGuard) -> Self {
        Self::new(guard, RouteRule::project())
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        self.map_rule(|rule| rule.with_resource(resource))
    }

    pub fn with_action(self, action: Action) -> Self {
        self.map_rule(|rule| rule.with_action(action))
    }

    /// Let the request through when no domain id is present.
    pub fn skip_when_missing(self) -> Self {
        self.map_rule(RouteRule::skip_when_missing)
    }

    /// Reject the request when no domain id is present, whatever the guard default.
    pub fn deny_when_missing(self) -> Self {
        self.map_rule(RouteRule::deny_when_missing)
    }

    fn map_rule(self, change: impl FnOnce(RouteRule) -> RouteRule) -> Self {
        let rule = change(RouteRule::clone(&self.rule));
        Self::new(self.guard, rule)
    }
}

impl<S> Layer<S> for AuthzLayer {
    type Service = AuthzMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthzMiddleware {
            inner,
            guard: self.guard.clone(),
            rule: self.rule.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthzMiddleware<S> {
    inner: S,
    guard: AuthzGuard,
    rule: Arc<RouteRule>,
}

impl<S> Service<Request<Body>> for AuthzMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let guard = self.guard.clone();
        let rule = self.rule.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let info = request_info(&mut parts).await;
            let principal = parts.extensions.get::<AuthUser>().map(|user| user.id.clone());

            match guard.check_at_level(&rule, principal.as_ref(), &info).await {
                Ok(Outcome::Allowed(context)) => {
                    parts.extensions.insert(context);
                }
                Ok(Outcome::Skipped { .. }) => {}
                Ok(Outcome::Unauthenticated) => {
                    return Ok(ApiError::Unauthorized.into_response());
                }
                Ok(Outcome::Denied(denial)) => {
                    return Ok(ApiError::from(denial).into_response());
                }
                // Fail closed; a broken store is never an allow or a 403.
                Err(err) => {
                    return Ok(ApiError::Internal(err.into()).into_response());
                }
            }

            inner.call(Request::from_parts(parts, body)).await
        })
    }
}

/// Adapt an axum request to the guard's framework-neutral view.
async fn request_info(parts: &mut Parts) -> RequestInfo {
    // Nested routers see a stripped URI; resources are counted from the full path.
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut info = RequestInfo::new(parts.method.as_str(), path);

    if let Ok(Path(params)) = Path::<HashMap<String, String>>::from_request_parts(parts, &()).await {
        info.path_params = params;
    }
    if let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        info.query_params = params;
    }

    info
}
