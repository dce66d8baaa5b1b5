//! The allow/deny decision procedure.

use crate::bootstrap::{Bootstrap, SYSTEM_ADMIN};
use crate::error::AuthzResult;
use crate::store::{MemoryStore, PolicyStore, RoleStore};
use crate::types::{
    Action, Domain, PermissionSet, PolicyRule, Resource, RoleAssignment, RoleInheritance,
    RoleName, Subject, UserId,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Answers "may this user do this action on this resource in this domain".
///
/// Direct grants on `user:<id>` and grants on any role the user holds in the
/// domain carry equal weight. There is no explicit deny: no match means deny.
pub struct Enforcer {
    policies: Arc<dyn PolicyStore>,
    roles: Arc<dyn RoleStore>,
}

impl Enforcer {
    pub fn new(policies: Arc<dyn PolicyStore>, roles: Arc<dyn RoleStore>) -> Self {
        Self { policies, roles }
    }

    /// Use one object for both stores.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: PolicyStore + RoleStore + 'static,
    {
        Self::new(store.clone(), store)
    }

    /// Enforcer over an empty process-local store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Enforcer over the Postgres store; migrates and loads all rules.
    #[cfg(feature = "postgres")]
    pub async fn postgres(pool: sqlx::PgPool) -> AuthzResult<Self> {
        let store = crate::store::PostgresStore::new(pool).await?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Decide a request. Store failures are returned to the caller.
    #[instrument(skip_all, level = "debug", fields(user = %user, domain = %domain, resource = %resource, action = %action))]
    pub async fn check(
        &self,
        user: &UserId,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> AuthzResult<bool> {
        if self
            .policies
            .match_policies(&user.subject(), domain, resource, action)
            .await?
        {
            return Ok(true);
        }

        for role in self.roles.roles_for_subject(user, domain).await? {
            if self
                .policies
                .match_policies(&Subject::Role(role), domain, resource, action)
                .await?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Like [`Enforcer::check`] but fail-closed: any store error is a deny.
    pub async fn enforce(
        &self,
        user: &UserId,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> bool {
        match self.check(user, domain, resource, action).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(
                    user = %user,
                    domain = %domain,
                    resource = %resource,
                    action = %action,
                    error = %err,
                    "Authorization store failed, denying"
                );
                false
            }
        }
    }

    /// Roles held in `domain` and every grant that applies there.
    pub async fn permissions_for(&self, user: &UserId, domain: &Domain) -> AuthzResult<PermissionSet> {
        let roles = self.roles.roles_for_subject(user, domain).await?;

        let mut policies = self
            .policies
            .policies_for_subject(&user.subject(), Some(domain))
            .await?;
        for role in &roles {
            policies.extend(
                self.policies
                    .policies_for_subject(&Subject::Role(role.clone()), Some(domain))
                    .await?,
            );
        }
        policies.sort();
        policies.dedup();

        Ok(PermissionSet {
            user: Some(user.clone()),
            domain: Some(domain.clone()),
            roles,
            policies,
        })
    }

    /// Roles held by `user` in `domain`, inheritance included.
    pub async fn roles_for_user(&self, user: &UserId, domain: &Domain) -> AuthzResult<Vec<RoleName>> {
        self.roles.roles_for_subject(user, domain).await
    }

    pub async fn assignments_for_user(&self, user: &UserId) -> AuthzResult<Vec<RoleAssignment>> {
        self.roles.assignments_for_user(user).await
    }

    /// Grants held by `subject`, optionally narrowed to one domain.
    pub async fn policies_for_subject(
        &self,
        subject: &Subject,
        domain: Option<&Domain>,
    ) -> AuthzResult<Vec<PolicyRule>> {
        self.policies.policies_for_subject(subject, domain).await
    }

    pub async fn all_policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        self.policies.all_policies().await
    }

    #[instrument(skip_all, fields(rule = %rule))]
    pub async fn grant(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        let inserted = self.policies.add_policy(rule).await?;
        info!(inserted, "Policy granted");
        Ok(inserted)
    }

    #[instrument(skip_all, fields(count = rules.len()))]
    pub async fn grant_batch(&self, rules: &[PolicyRule]) -> AuthzResult<usize> {
        let inserted = self.policies.add_policies(rules).await?;
        info!(inserted, "Policies granted");
        Ok(inserted)
    }

    #[instrument(skip_all, fields(rule = %rule))]
    pub async fn revoke(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        let removed = self.policies.remove_policy(rule).await?;
        info!(removed, "Policy revoked");
        Ok(removed)
    }

    #[instrument(skip_all, fields(user = %assignment.user, role = %assignment.role, domain = %assignment.domain))]
    pub async fn assign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        assignment.ensure_concrete()?;
        let assigned = self.roles.assign_role(assignment).await?;
        info!(assigned, "Role assigned");
        Ok(assigned)
    }

    #[instrument(skip_all, fields(user = %assignment.user, role = %assignment.role, domain = %assignment.domain))]
    pub async fn unassign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        let removed = self.roles.unassign_role(assignment).await?;
        info!(removed, "Role unassigned");
        Ok(removed)
    }

    #[instrument(skip_all, fields(role = %edge.role, parent = %edge.parent, domain = %edge.domain))]
    pub async fn add_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        let added = self.roles.add_role_inheritance(edge).await?;
        info!(added, "Role inheritance added");
        Ok(added)
    }

    #[instrument(skip_all, fields(role = %edge.role, parent = %edge.parent, domain = %edge.domain))]
    pub async fn remove_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        let removed = self.roles.remove_role_inheritance(edge).await?;
        info!(removed, "Role inheritance removed");
        Ok(removed)
    }

    /// Re-read the backing store.
    pub async fn reload(&self) -> AuthzResult<()> {
        self.policies.reload().await?;
        info!("Authorization policies reloaded");
        Ok(())
    }

    /// Install bootstrap policies and system administrators.
    ///
    /// Returns the number of grants and assignments that were new.
    #[instrument(skip(self, bootstrap))]
    pub async fn seed(&self, bootstrap: &Bootstrap) -> AuthzResult<usize> {
        let mut created = self.policies.add_policies(&bootstrap.all_policies()).await?;

        let admin_role = RoleName::new(SYSTEM_ADMIN)?;
        for admin in &bootstrap.system_admins {
            let assignment = RoleAssignment::new(admin.clone(), admin_role.clone(), Domain::System)?;
            if self.roles.assign_role(&assignment).await? {
                created += 1;
            }
        }

        info!(
            created,
            system_admins = bootstrap.system_admins.len(),
            "Authorization bootstrap applied"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use async_trait::async_trait;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn rule(s: &str, d: &str, r: &str, a: &str) -> PolicyRule {
        PolicyRule::parse(s, d, r, a).unwrap()
    }

    fn assignment(u: &str, role: &str, d: &str) -> RoleAssignment {
        RoleAssignment::parse(u, role, d).unwrap()
    }

    fn res(name: &str) -> Resource {
        Resource::new(name).unwrap()
    }

    fn act(name: &str) -> Action {
        Action::new(name).unwrap()
    }

    fn dom(raw: &str) -> Domain {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_default_deny() {
        let enforcer = Enforcer::in_memory();
        assert!(!enforcer
            .check(&user("1"), &Domain::System, &res("policies"), &Action::read())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_direct_grant_and_revoke_round_trip() {
        let enforcer = Enforcer::in_memory();
        let grant = rule("user:7", "project:3", "file", "upload");

        assert!(enforcer.grant(&grant).await.unwrap());
        assert!(enforcer
            .check(&user("7"), &dom("project:3"), &res("file"), &act("upload"))
            .await
            .unwrap());

        assert!(enforcer.revoke(&grant).await.unwrap());
        assert!(!enforcer
            .check(&user("7"), &dom("project:3"), &res("file"), &act("upload"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_domain_isolation() {
        let enforcer = Enforcer::in_memory();
        enforcer.assign_role(&assignment("user:10", "GROUP_ADMIN", "group:5")).await.unwrap();
        enforcer.grant(&rule("GROUP_ADMIN", "group:5", "file", "upload")).await.unwrap();

        assert!(enforcer
            .check(&user("10"), &dom("group:5"), &res("file"), &act("upload"))
            .await
            .unwrap());
        assert!(!enforcer
            .check(&user("10"), &dom("group:7"), &res("file"), &act("upload"))
            .await
            .unwrap());
        assert!(!enforcer
            .check(&user("10"), &dom("project:5"), &res("file"), &act("upload"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_wildcard_domain_policy() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("MEMBER", "*", "file", "read")).await.unwrap();
        enforcer.assign_role(&assignment("user:3", "MEMBER", "group:9")).await.unwrap();

        assert!(enforcer
            .check(&user("3"), &dom("group:9"), &res("file"), &act("read"))
            .await
            .unwrap());
        // The role is still only held in group:9.
        assert!(!enforcer
            .check(&user("3"), &dom("group:10"), &res("file"), &act("read"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_wildcard_resource_and_action() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("GROUP_ADMIN", "group:1", "*", "*")).await.unwrap();
        enforcer.assign_role(&assignment("user:2", "GROUP_ADMIN", "group:1")).await.unwrap();

        for (resource, action) in [("file", "read"), ("projects", "delete"), ("members", "invite")] {
            assert!(enforcer
                .check(&user("2"), &dom("group:1"), &res(resource), &act(action))
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_group_admin_project_scenario() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("GROUP_ADMIN", "*", "projects", "create")).await.unwrap();
        enforcer.assign_role(&assignment("user:42", "GROUP_ADMIN", "group:2")).await.unwrap();

        assert!(enforcer
            .check(&user("42"), &dom("group:2"), &res("projects"), &Action::create())
            .await
            .unwrap());
        assert!(!enforcer
            .check(&user("42"), &dom("group:2"), &res("projects"), &Action::delete())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_padded_domain_ids_do_not_match() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("user:1", "group:5", "file", "read")).await.unwrap();
        assert!(!enforcer
            .check(&user("1"), &dom("group:05"), &res("file"), &act("read"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_inherited_role_grants_apply() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("MEMBER", "*", "file", "read")).await.unwrap();
        enforcer
            .add_role_inheritance(&RoleInheritance::new(
                RoleName::new("GROUP_ADMIN").unwrap(),
                RoleName::new("MEMBER").unwrap(),
                Domain::Any,
            ))
            .await
            .unwrap();
        enforcer.assign_role(&assignment("user:5", "GROUP_ADMIN", "group:1")).await.unwrap();

        assert!(enforcer
            .check(&user("5"), &dom("group:1"), &res("file"), &act("read"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_permissions_for_merges_direct_and_role_grants() {
        let enforcer = Enforcer::in_memory();
        enforcer.grant(&rule("MEMBER", "*", "file", "read")).await.unwrap();
        enforcer.grant(&rule("MEMBER", "group:2", "file", "delete")).await.unwrap();
        enforcer.grant(&rule("user:8", "group:1", "projects", "create")).await.unwrap();
        enforcer.assign_role(&assignment("user:8", "MEMBER", "group:1")).await.unwrap();

        let set = enforcer.permissions_for(&user("8"), &dom("group:1")).await.unwrap();
        assert_eq!(set.roles, vec![RoleName::new("MEMBER").unwrap()]);
        assert_eq!(
            set.policies,
            vec![
                rule("user:8", "group:1", "projects", "create"),
                rule("MEMBER", "*", "file", "read"),
            ]
        );
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let enforcer = Enforcer::in_memory();
        let bootstrap = Bootstrap {
            base_policies: true,
            policies: vec![],
            system_admins: vec![user("1")],
        };

        let first = enforcer.seed(&bootstrap).await.unwrap();
        assert!(first > 1);
        assert_eq!(enforcer.seed(&bootstrap).await.unwrap(), 0);

        assert!(enforcer
            .check(&user("1"), &Domain::System, &res("policies"), &Action::create())
            .await
            .unwrap());
    }

    /// Store whose every call fails, standing in for a lost database.
    struct BrokenStore;

    #[async_trait]
    impl PolicyStore for BrokenStore {
        async fn add_policy(&self, _: &PolicyRule) -> AuthzResult<bool> {
            Err(AuthzError::Internal("connection refused".into()))
        }
        async fn add_policies(&self, _: &[PolicyRule]) -> AuthzResult<usize> {
            Err(AuthzError::Internal("connection refused".into()))
        }
        async fn remove_policy(&self, _: &PolicyRule) -> AuthzResult<bool> {
            Err(AuthzError::Internal("connection refused".into()))
        }
        async fn match_policies(
            &self,
            _: &Subject,
            _: &Domain,
            _: &Resource,
            _: &Action,
        ) -> AuthzResult<bool> {
            Err(AuthzError::Internal("connection refused".into()))
        }
        async fn policies_for_subject(
            &self,
            _: &Subject,
            _: Option<&Domain>,
        ) -> AuthzResult<Vec<PolicyRule>> {
            Err(AuthzError::Internal("connection refused".into()))
        }
        async fn all_policies(&self) -> AuthzResult<Vec<PolicyRule>> {
            Err(AuthzError::Internal("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_error_fails_closed() {
        let roles = Arc::new(MemoryStore::new());
        roles.assign_role(&assignment("user:1", "MEMBER", "group:1")).await.unwrap();
        let enforcer = Enforcer::new(Arc::new(BrokenStore), roles);

        let result = enforcer
            .check(&user("1"), &dom("group:1"), &res("file"), &act("read"))
            .await;
        assert!(result.is_err());

        assert!(!enforcer
            .enforce(&user("1"), &dom("group:1"), &res("file"), &act("read"))
            .await);
    }
}
