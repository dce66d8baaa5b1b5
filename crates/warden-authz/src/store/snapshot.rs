//! Immutable policy state shared by readers.

use super::StoredRule;
use crate::types::{
    Action, Domain, PolicyRule, Resource, RoleAssignment, RoleInheritance, RoleName, Subject,
    UserId,
};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Complete policy state at one point in time.
///
/// Readers hold an `Arc` to a snapshot; writers clone it, apply a change and
/// publish the new version.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    policies: HashMap<Subject, BTreeSet<PolicyRule>>,
    assignments: HashMap<(UserId, Domain), BTreeSet<RoleName>>,
    inheritance: HashMap<RoleName, BTreeSet<RoleInheritance>>,
}

impl PolicySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from persisted rows.
    pub fn from_rules(rules: impl IntoIterator<Item = StoredRule>) -> Self {
        let mut snapshot = Self::new();
        for rule in rules {
            snapshot.apply(&rule, true);
        }
        snapshot
    }

    /// Insert (`present = true`) or remove a persisted row. Returns whether anything changed.
    pub fn apply(&mut self, rule: &StoredRule, present: bool) -> bool {
        match (rule, present) {
            (StoredRule::Policy(rule), true) => self.insert_policy(rule.clone()),
            (StoredRule::Policy(rule), false) => self.remove_policy(rule),
            (StoredRule::Assignment(a), true) => self.insert_assignment(a.clone()),
            (StoredRule::Assignment(a), false) => self.remove_assignment(a),
            (StoredRule::Inheritance(edge), true) => self.insert_inheritance(edge.clone()),
            (StoredRule::Inheritance(edge), false) => self.remove_inheritance(edge),
        }
    }

    pub fn insert_policy(&mut self, rule: PolicyRule) -> bool {
        self.policies
            .entry(rule.subject.clone())
            .or_default()
            .insert(rule)
    }

    pub fn remove_policy(&mut self, rule: &PolicyRule) -> bool {
        let Some(rules) = self.policies.get_mut(&rule.subject) else {
            return false;
        };
        let removed = rules.remove(rule);
        if rules.is_empty() {
            self.policies.remove(&rule.subject);
        }
        removed
    }

    pub fn contains_policy(&self, rule: &PolicyRule) -> bool {
        self.policies
            .get(&rule.subject)
            .is_some_and(|rules| rules.contains(rule))
    }

    pub fn match_policies(
        &self,
        subject: &Subject,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> bool {
        self.policies.get(subject).is_some_and(|rules| {
            rules
                .iter()
                .any(|rule| rule.matches(subject, domain, resource, action))
        })
    }

    pub fn policies_for_subject(&self, subject: &Subject, domain: Option<&Domain>) -> Vec<PolicyRule> {
        self.policies
            .get(subject)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|rule| domain.map_or(true, |d| rule.domain.matches(d)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all_policies(&self) -> Vec<PolicyRule> {
        let mut all: Vec<PolicyRule> = self.policies.values().flatten().cloned().collect();
        all.sort();
        all
    }

    pub fn policy_count(&self) -> usize {
        self.policies.values().map(BTreeSet::len).sum()
    }

    pub fn insert_assignment(&mut self, assignment: RoleAssignment) -> bool {
        self.assignments
            .entry((assignment.user, assignment.domain))
            .or_default()
            .insert(assignment.role)
    }

    pub fn remove_assignment(&mut self, assignment: &RoleAssignment) -> bool {
        let key = (assignment.user.clone(), assignment.domain.clone());
        let Some(roles) = self.assignments.get_mut(&key) else {
            return false;
        };
        let removed = roles.remove(&assignment.role);
        if roles.is_empty() {
            self.assignments.remove(&key);
        }
        removed
    }

    pub fn assignments_for_user(&self, user: &UserId) -> Vec<RoleAssignment> {
        let mut found: Vec<RoleAssignment> = self
            .assignments
            .iter()
            .filter(|((holder, _), _)| holder == user)
            .flat_map(|((holder, domain), roles)| {
                roles.iter().map(move |role| RoleAssignment {
                    user: holder.clone(),
                    role: role.clone(),
                    domain: domain.clone(),
                })
            })
            .collect();
        found.sort();
        found
    }

    pub fn insert_inheritance(&mut self, edge: RoleInheritance) -> bool {
        self.inheritance
            .entry(edge.role.clone())
            .or_default()
            .insert(edge)
    }

    pub fn remove_inheritance(&mut self, edge: &RoleInheritance) -> bool {
        let Some(edges) = self.inheritance.get_mut(&edge.role) else {
            return false;
        };
        let removed = edges.remove(edge);
        if edges.is_empty() {
            self.inheritance.remove(&edge.role);
        }
        removed
    }

    /// Roles bound to `user` in exactly `domain`, plus everything they imply
    /// through inheritance edges scoped to `domain` or `*`.
    pub fn roles_for_subject(&self, user: &UserId, domain: &Domain) -> Vec<RoleName> {
        let key = (user.clone(), domain.clone());
        let Some(direct) = self.assignments.get(&key) else {
            return Vec::new();
        };

        let mut closure: BTreeSet<RoleName> = direct.clone();
        let mut queue: VecDeque<RoleName> = direct.iter().cloned().collect();

        while let Some(role) = queue.pop_front() {
            let Some(edges) = self.inheritance.get(&role) else {
                continue;
            };
            for edge in edges.iter().filter(|e| e.domain.matches(domain)) {
                if closure.insert(edge.parent.clone()) {
                    queue.push_back(edge.parent.clone());
                }
            }
        }

        closure.into_iter().collect()
    }
}
