//! Policy and role assignment storage.
//!
//! Both stores are traits so the enforcer can run against the in-memory
//! snapshot store, the Postgres-backed store, or a test fake.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod snapshot;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use snapshot::PolicySnapshot;

use crate::error::{AuthzError, AuthzResult};
use crate::types::{
    Action, Domain, PolicyRule, Resource, RoleAssignment, RoleInheritance, RoleName, Subject,
    UserId,
};
use async_trait::async_trait;

/// Storage for grant tuples.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert a grant. Returns `false` when the identical tuple already exists.
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<bool>;

    /// Insert many grants at once. Returns how many were new.
    async fn add_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize>;

    /// Remove a grant. Returns `false` when it was not present.
    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<bool>;

    /// True if any stored tuple for exactly `subject` matches the query.
    async fn match_policies(
        &self,
        subject: &Subject,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> AuthzResult<bool>;

    /// Grants held by `subject`; a domain filter keeps tuples for that domain or `*`.
    async fn policies_for_subject(
        &self,
        subject: &Subject,
        domain: Option<&Domain>,
    ) -> AuthzResult<Vec<PolicyRule>>;

    /// Every stored grant.
    async fn all_policies(&self) -> AuthzResult<Vec<PolicyRule>>;

    /// Re-read the backing storage. A no-op for purely in-memory stores.
    async fn reload(&self) -> AuthzResult<()> {
        Ok(())
    }
}

/// Storage for user-to-role bindings and role-to-role inheritance.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Bind a user to a role in a concrete domain. Returns `false` if already bound.
    async fn assign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool>;

    /// Remove a binding. Returns `false` if it did not exist.
    async fn unassign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool>;

    /// Roles bound to `user` exactly in `domain`, closed over inheritance.
    async fn roles_for_subject(&self, user: &UserId, domain: &Domain)
        -> AuthzResult<Vec<RoleName>>;

    /// Every binding held by `user`, across domains.
    async fn assignments_for_user(&self, user: &UserId) -> AuthzResult<Vec<RoleAssignment>>;

    /// Record that `edge.role` implies `edge.parent`.
    async fn add_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool>;

    /// Drop an inheritance edge.
    async fn remove_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool>;
}

/// Tuple kind column of the persisted schema.
pub const PTYPE_POLICY: &str = "p";
pub const PTYPE_ASSIGNMENT: &str = "g";
pub const PTYPE_INHERITANCE: &str = "g2";

/// One persisted row, independent of the storage engine.
///
/// Columns are `ptype, v0..v5`; `v4` and `v5` are reserved and always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRule {
    Policy(PolicyRule),
    Assignment(RoleAssignment),
    Inheritance(RoleInheritance),
}

impl StoredRule {
    pub fn ptype(&self) -> &'static str {
        match self {
            Self::Policy(_) => PTYPE_POLICY,
            Self::Assignment(_) => PTYPE_ASSIGNMENT,
            Self::Inheritance(_) => PTYPE_INHERITANCE,
        }
    }

    /// The `v0..v5` columns.
    pub fn values(&self) -> [String; 6] {
        match self {
            Self::Policy(rule) => [
                rule.subject.to_string(),
                rule.domain.to_string(),
                rule.resource.to_string(),
                rule.action.to_string(),
                String::new(),
                String::new(),
            ],
            Self::Assignment(assignment) => [
                assignment.user.to_string(),
                assignment.domain.to_string(),
                assignment.role.to_string(),
                String::new(),
                String::new(),
                String::new(),
            ],
            Self::Inheritance(edge) => [
                edge.role.to_string(),
                edge.domain.to_string(),
                edge.parent.to_string(),
                String::new(),
                String::new(),
                String::new(),
            ],
        }
    }

    /// Rebuild a rule from its persisted columns.
    pub fn from_columns(ptype: &str, values: &[String]) -> AuthzResult<Self> {
        let column = |i: usize| values.get(i).map(String::as_str).unwrap_or("");

        match ptype {
            PTYPE_POLICY => {
                PolicyRule::parse(column(0), column(1), column(2), column(3)).map(Self::Policy)
            }
            PTYPE_ASSIGNMENT => {
                RoleAssignment::parse(column(0), column(2), column(1)).map(Self::Assignment)
            }
            PTYPE_INHERITANCE => Ok(Self::Inheritance(RoleInheritance::new(
                column(0).parse()?,
                column(2).parse()?,
                column(1).parse()?,
            ))),
            other => Err(AuthzError::invalid("rule type", other)),
        }
    }
}
