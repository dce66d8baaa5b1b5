//! Principal middleware layer.

use super::types::AuthUser;
use axum::{
    body::Body,
    http::{HeaderName, Request},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Reads the trusted principal header into an [`AuthUser`] extension.
///
/// Requests without a usable header pass through unauthenticated; the
/// authorization layer decides whether that is acceptable.
#[derive(Clone)]
pub struct PrincipalLayer {
    header: HeaderName,
}

impl PrincipalLayer {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl<S> Layer<S> for PrincipalLayer {
    type Service = PrincipalMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PrincipalMiddleware {
            inner,
            header: self.header.clone(),
        }
    }
}

/// Principal middleware service.
#[derive(Clone)]
pub struct PrincipalMiddleware<S> {
    inner: S,
    header: HeaderName,
}

impl<S> Service<Request<Body>> for PrincipalMiddleware<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // Never trust an identity that arrived some other way.
        req.extensions_mut().remove::<AuthUser>();

        if let Some(user) = principal(&req, &self.header) {
            req.extensions_mut().insert(user);
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

fn principal(req: &Request<Body>, header: &HeaderName) -> Option<AuthUser> {
    let value = req.headers().get(header)?;
    let parsed = value.to_str().ok().and_then(AuthUser::from_header_value);
    if parsed.is_none() {
        debug!(header = %header, "Ignoring malformed principal header");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    async fn echo(req: Request<Body>) -> Result<Response, Infallible> {
        let body = match req.extensions().get::<AuthUser>() {
            Some(user) => user.id.to_string(),
            None => "anonymous".to_string(),
        };
        Ok((StatusCode::OK, body).into_response())
    }

    async fn run(req: Request<Body>) -> String {
        let service = PrincipalLayer::new(HeaderName::from_static("x-user-id")).layer(service_fn(echo));
        let response = service.oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_header_becomes_principal() {
        let req = Request::builder()
            .header("x-user-id", "user:42")
            .body(Body::empty())
            .unwrap();
        assert_eq!(run(req).await, "user:42");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_is_anonymous() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(run(req).await, "anonymous");

        let req = Request::builder()
            .header("x-user-id", "not valid")
            .body(Body::empty())
            .unwrap();
        assert_eq!(run(req).await, "anonymous");
    }
}
