//! Built-in roles and startup seeding.

use crate::types::{Action, Domain, PolicyRule, Resource, RoleName, Subject, UserId};
use serde::{Deserialize, Serialize};

/// Full access to the `system` domain.
pub const SYSTEM_ADMIN: &str = "SYSTEM_ADMIN";
/// Manages one group.
pub const GROUP_ADMIN: &str = "GROUP_ADMIN";
/// Manages one project.
pub const PROJECT_ADMIN: &str = "PROJECT_ADMIN";
/// Ordinary participant of a group or project.
pub const MEMBER: &str = "MEMBER";

/// What to install at startup. Seeding is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bootstrap {
    /// Install the built-in role policies from [`base_policies`].
    #[serde(default)]
    pub base_policies: bool,
    /// Extra grants.
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
    /// Users bound to `SYSTEM_ADMIN` in the `system` domain.
    #[serde(default)]
    pub system_admins: Vec<UserId>,
}

impl Bootstrap {
    /// All grants this bootstrap installs.
    pub fn all_policies(&self) -> Vec<PolicyRule> {
        let mut rules = if self.base_policies {
            base_policies()
        } else {
            Vec::new()
        };
        rules.extend(self.policies.iter().cloned());
        rules
    }
}

fn role_subject(name: &str) -> Subject {
    Subject::Role(RoleName::new(name).expect("built-in role names are valid"))
}

fn resource(name: &str) -> Resource {
    Resource::new(name).expect("built-in resource names are valid")
}

fn grant(role: &str, resource_name: &str, action: Action) -> PolicyRule {
    PolicyRule::new(role_subject(role), Domain::Any, resource(resource_name), action)
}

fn full_access(role: &str, resource_name: &str) -> Vec<PolicyRule> {
    [Action::create(), Action::read(), Action::update(), Action::delete()]
        .into_iter()
        .map(|action| grant(role, resource_name, action))
        .collect()
}

/// Policies for the built-in roles.
///
/// Group and project roles use the wildcard domain; they only take effect in
/// the domains where a user actually holds the role.
pub fn base_policies() -> Vec<PolicyRule> {
    let mut rules = vec![PolicyRule::new(
        role_subject(SYSTEM_ADMIN),
        Domain::System,
        Resource::any(),
        Action::any(),
    )];

    // Group admins
    rules.push(grant(GROUP_ADMIN, "groups", Action::read()));
    rules.push(grant(GROUP_ADMIN, "groups", Action::update()));
    rules.push(grant(GROUP_ADMIN, "groups", Action::delete()));
    rules.extend(full_access(GROUP_ADMIN, "members"));
    rules.extend(full_access(GROUP_ADMIN, "roles"));
    rules.extend(full_access(GROUP_ADMIN, "projects"));
    rules.extend(full_access(GROUP_ADMIN, "files"));

    // Project admins
    rules.push(grant(PROJECT_ADMIN, "projects", Action::read()));
    rules.push(grant(PROJECT_ADMIN, "projects", Action::update()));
    rules.push(grant(PROJECT_ADMIN, "projects", Action::delete()));
    rules.extend(full_access(PROJECT_ADMIN, "roles"));
    rules.extend(full_access(PROJECT_ADMIN, "files"));

    // Members
    rules.push(grant(MEMBER, "groups", Action::read()));
    rules.push(grant(MEMBER, "projects", Action::read()));
    rules.push(grant(MEMBER, "members", Action::read()));
    rules.push(grant(MEMBER, "files", Action::read()));
    rules.push(grant(MEMBER, "files", Action::create()));

    rules
}
