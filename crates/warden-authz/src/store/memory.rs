//! In-memory store using copy-on-write snapshots.

use super::{PolicySnapshot, PolicyStore, RoleStore, StoredRule};
use crate::error::AuthzResult;
use crate::types::{
    Action, Domain, PolicyRule, Resource, RoleAssignment, RoleInheritance, RoleName, Subject,
    UserId,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Process-local policy store.
///
/// Readers clone the current `Arc<PolicySnapshot>` under a read lock that is
/// held only for the clone. Writers are serialized by `write_lock`, build the
/// next snapshot off to the side and publish it with a single pointer swap, so
/// a mutation is visible to every check that starts after it returns.
pub struct MemoryStore {
    current: RwLock<Arc<PolicySnapshot>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(PolicySnapshot::new())
    }

    pub fn from_snapshot(snapshot: PolicySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        }
    }

    /// The snapshot every read in flight is using.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.read().clone()
    }

    /// Swap in a whole new state, e.g. after reloading from storage.
    pub fn replace(&self, snapshot: PolicySnapshot) {
        let _guard = self.write_lock.lock();
        *self.current.write() = Arc::new(snapshot);
    }

    /// Apply persisted-row changes as one atomic publication.
    ///
    /// Returns how many rows actually changed the state.
    pub fn apply(&self, rules: &[StoredRule], present: bool) -> usize {
        self.mutate(|next| {
            rules
                .iter()
                .filter(|rule| next.apply(rule, present))
                .count()
        })
    }

    fn mutate(&self, change: impl FnOnce(&mut PolicySnapshot) -> usize) -> usize {
        let _guard = self.write_lock.lock();
        let mut next = PolicySnapshot::clone(&self.current.read());
        let changed = change(&mut next);
        if changed > 0 {
            *self.current.write() = Arc::new(next);
        }
        changed
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        if self.snapshot().contains_policy(rule) {
            return Ok(false);
        }
        let inserted = self.mutate(|next| usize::from(next.insert_policy(rule.clone()))) > 0;
        debug!(rule = %rule, inserted, "Policy add");
        Ok(inserted)
    }

    async fn add_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize> {
        let inserted = self.mutate(|next| {
            rules
                .iter()
                .filter(|rule| next.insert_policy((*rule).clone()))
                .count()
        });
        debug!(requested = rules.len(), inserted, "Policy batch add");
        Ok(inserted)
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        if !self.snapshot().contains_policy(rule) {
            return Ok(false);
        }
        let removed = self.mutate(|next| usize::from(next.remove_policy(rule))) > 0;
        debug!(rule = %rule, removed, "Policy remove");
        Ok(removed)
    }

    async fn match_policies(
        &self,
        subject: &Subject,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> AuthzResult<bool> {
        Ok(self
            .snapshot()
            .match_policies(subject, domain, resource, action))
    }

    async fn policies_for_subject(
        &self,
        subject: &Subject,
        domain: Option<&Domain>,
    ) -> AuthzResult<Vec<PolicyRule>> {
        Ok(self.snapshot().policies_for_subject(subject, domain))
    }

    async fn all_policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        Ok(self.snapshot().all_policies())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn assign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        assignment.ensure_concrete()?;
        let assigned = self.mutate(|next| usize::from(next.insert_assignment(assignment.clone()))) > 0;
        debug!(
            user = %assignment.user,
            role = %assignment.role,
            domain = %assignment.domain,
            assigned,
            "Role assign"
        );
        Ok(assigned)
    }

    async fn unassign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        let unassigned = self.mutate(|next| usize::from(next.remove_assignment(assignment))) > 0;
        debug!(
            user = %assignment.user,
            role = %assignment.role,
            domain = %assignment.domain,
            unassigned,
            "Role unassign"
        );
        Ok(unassigned)
    }

    async fn roles_for_subject(
        &self,
        user: &UserId,
        domain: &Domain,
    ) -> AuthzResult<Vec<RoleName>> {
        Ok(self.snapshot().roles_for_subject(user, domain))
    }

    async fn assignments_for_user(&self, user: &UserId) -> AuthzResult<Vec<RoleAssignment>> {
        Ok(self.snapshot().assignments_for_user(user))
    }

    async fn add_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        Ok(self.mutate(|next| usize::from(next.insert_inheritance(edge.clone()))) > 0)
    }

    async fn remove_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        Ok(self.mutate(|next| usize::from(next.remove_inheritance(edge))) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(s: &str, d: &str, r: &str, a: &str) -> PolicyRule {
        PolicyRule::parse(s, d, r, a).unwrap()
    }

    #[tokio::test]
    async fn test_add_policy_is_idempotent() {
        let store = MemoryStore::new();
        let grant = rule("GROUP_ADMIN", "group:1", "*", "*");

        assert!(store.add_policy(&grant).await.unwrap());
        assert!(!store.add_policy(&grant).await.unwrap());
        assert_eq!(store.all_policies().await.unwrap(), vec![grant]);
    }

    #[tokio::test]
    async fn test_remove_absent_policy_is_not_an_error() {
        let store = MemoryStore::new();
        let grant = rule("MEMBER", "*", "file", "read");
        assert!(!store.remove_policy(&grant).await.unwrap());
    }

    #[tokio::test]
    async fn test_match_uses_stored_wildcards_only() {
        let store = MemoryStore::new();
        store.add_policy(&rule("MEMBER", "*", "file", "read")).await.unwrap();

        let member = Subject::role("MEMBER").unwrap();
        let file: Resource = "file".parse().unwrap();

        assert!(store
            .match_policies(&member, &Domain::group(9), &file, &Action::read())
            .await
            .unwrap());
        assert!(!store
            .match_policies(&member, &Domain::group(9), &file, &Action::delete())
            .await
            .unwrap());

        let other = Subject::role("GUEST").unwrap();
        assert!(!store
            .match_policies(&other, &Domain::group(9), &file, &Action::read())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_batch_add_counts_new_rules() {
        let store = MemoryStore::new();
        store.add_policy(&rule("MEMBER", "*", "file", "read")).await.unwrap();

        let inserted = store
            .add_policies(&[
                rule("MEMBER", "*", "file", "read"),
                rule("MEMBER", "*", "file", "create"),
                rule("MEMBER", "*", "file", "create"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.all_policies().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_policies_for_subject_filters_domain() {
        let store = MemoryStore::new();
        store.add_policy(&rule("MEMBER", "*", "file", "read")).await.unwrap();
        store.add_policy(&rule("MEMBER", "group:1", "file", "create")).await.unwrap();
        store.add_policy(&rule("MEMBER", "group:2", "file", "delete")).await.unwrap();

        let member = Subject::role("MEMBER").unwrap();
        let in_group_one = store
            .policies_for_subject(&member, Some(&Domain::group(1)))
            .await
            .unwrap();
        assert_eq!(in_group_one.len(), 2);
        assert!(in_group_one.iter().all(|r| r.domain != Domain::group(2)));

        let everywhere = store.policies_for_subject(&member, None).await.unwrap();
        assert_eq!(everywhere.len(), 3);
    }

    #[tokio::test]
    async fn test_assignment_rejects_wildcard_domain() {
        let store = MemoryStore::new();
        let assignment = RoleAssignment {
            user: UserId::new("1").unwrap(),
            role: RoleName::new("MEMBER").unwrap(),
            domain: Domain::Any,
        };
        assert!(store.assign_role(&assignment).await.is_err());
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot() {
        let store = MemoryStore::new();
        let before = store.snapshot();
        store.add_policy(&rule("MEMBER", "*", "file", "read")).await.unwrap();

        assert_eq!(before.policy_count(), 0);
        assert_eq!(store.snapshot().policy_count(), 1);
    }

    #[tokio::test]
    async fn test_noop_mutation_keeps_snapshot_pointer() {
        let store = MemoryStore::new();
        let before = store.snapshot();
        store.remove_policy(&rule("MEMBER", "*", "file", "read")).await.unwrap();
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }
}
