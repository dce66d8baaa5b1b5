//! Middleware for the Warden API server.

pub mod auth;
pub mod authz;

pub use auth::{Auth, AuthUser, PrincipalLayer, PrincipalMiddleware};
pub use authz::{AuthzLayer, AuthzMiddleware};
