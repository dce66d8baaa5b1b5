//! Warden authorization engine
//!
//! Hierarchical, multi-domain role-based access control. Every decision is
//! scoped to a domain: `system`, `group:<id>` or `project:<id>`.
//!
//! # Architecture
//!
//! - **Types**: validated identifiers and rule records
//! - **Store**: policy and role-assignment persistence behind async traits
//! - **Enforcer**: the allow/deny decision over the stores
//! - **Mapper / Resolver**: derive action, resource and domain from a request
//! - **Guard**: the per-request state machine HTTP layers delegate to
//!
//! # Features
//!
//! - `postgres` - durable store on top of sqlx (default)
//! - `integration-tests` - run store tests against a Postgres container

#![warn(clippy::all)]

pub mod audit;
pub mod bootstrap;
pub mod enforcer;
pub mod error;
pub mod guard;
pub mod mapper;
pub mod request;
pub mod resolver;
pub mod store;
pub mod types;

pub use bootstrap::Bootstrap;
pub use enforcer::Enforcer;
pub use error::{AuthzError, AuthzResult};
pub use guard::{AuthzGuard, DecisionContext, Denial, DenyReason, MissingDomain, Outcome, RouteRule};
pub use mapper::ResourceMapper;
pub use request::RequestInfo;
pub use resolver::{resolve_domain, Level};
pub use store::{MemoryStore, PolicyStore, RoleStore};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
pub use types::{
    Action, Domain, PermissionSet, PolicyRule, Resource, RoleAssignment, RoleInheritance,
    RoleName, Subject, UserId,
};
