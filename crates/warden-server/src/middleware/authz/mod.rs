//! Domain-scoped authorization for routes.

pub mod layer;

pub use layer::{AuthzLayer, AuthzMiddleware};
