//! Level-parameterised request authorization.
//!
//! One procedure serves system, group and project routes:
//!
//! ```text
//! Unauthenticated ─► DomainResolved | DomainSkipped ─► Checked ─► Allowed | Denied
//! ```
//!
//! HTTP adapters translate [`Outcome`] into their own responses.

use crate::audit::{AuditOutcome, AuthzAuditEvent};
use crate::enforcer::Enforcer;
use crate::error::AuthzResult;
use crate::mapper::ResourceMapper;
use crate::request::RequestInfo;
use crate::resolver::{resolve_domain, Level};
use crate::types::{Action, Domain, Resource, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do when a group or project route carries no usable id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDomain {
    /// Let the request through without consulting the enforcer.
    Skip,
    /// Reject the request.
    #[default]
    Deny,
}

/// Authorization requirement attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub level: Level,
    /// Overrides the path-derived resource.
    pub resource: Option<Resource>,
    /// Overrides the method-derived action.
    pub action: Option<Action>,
    /// Overrides domain resolution.
    pub domain: Option<Domain>,
    /// Overrides the guard's default missing-domain policy.
    pub missing_domain: Option<MissingDomain>,
}

impl RouteRule {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            resource: None,
            action: None,
            domain: None,
            missing_domain: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Level::System)
    }

    pub fn group() -> Self {
        Self::new(Level::Group)
    }

    pub fn project() -> Self {
        Self::new(Level::Project)
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Routes with no natural scope opt into skipping.
    pub fn skip_when_missing(mut self) -> Self {
        self.missing_domain = Some(MissingDomain::Skip);
        self
    }

    pub fn deny_when_missing(mut self) -> Self {
        self.missing_domain = Some(MissingDomain::Deny);
        self
    }
}

/// The request-scoped decision context of an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionContext {
    pub principal: UserId,
    pub domain: Domain,
    pub resource: Resource,
    pub action: Action,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoMatchingPolicy,
    MissingDomain,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatchingPolicy => "no_matching_policy",
            Self::MissingDomain => "missing_domain",
        }
    }
}

/// Diagnostics for a denied request; enough to render a forbidden error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub level: Level,
    pub domain: Option<Domain>,
    pub resource: Resource,
    pub action: Action,
    pub reason: DenyReason,
}

/// Final state of a request passing through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unauthenticated,
    Skipped { level: Level },
    Allowed(DecisionContext),
    Denied(Denial),
}

impl Outcome {
    /// True when the request may proceed.
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Allowed(_) | Self::Skipped { .. })
    }
}

/// Resolves, maps and checks requests against a shared [`Enforcer`].
#[derive(Clone)]
pub struct AuthzGuard {
    enforcer: Arc<Enforcer>,
    mapper: ResourceMapper,
    missing_domain: MissingDomain,
}

impl AuthzGuard {
    pub fn new(enforcer: Arc<Enforcer>) -> Self {
        Self {
            enforcer,
            mapper: ResourceMapper::default(),
            missing_domain: MissingDomain::default(),
        }
    }

    pub fn with_mapper(mut self, mapper: ResourceMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_missing_domain(mut self, policy: MissingDomain) -> Self {
        self.missing_domain = policy;
        self
    }

    /// Run the full decision for one request.
    ///
    /// Store failures come back as `Err` and must be rendered as an internal
    /// error, never as an allow.
    pub async fn check_at_level(
        &self,
        rule: &RouteRule,
        principal: Option<&UserId>,
        request: &RequestInfo,
    ) -> AuthzResult<Outcome> {
        let Some(user) = principal else {
            AuthzAuditEvent::new(None, rule.level, AuditOutcome::Unauthenticated).log();
            return Ok(Outcome::Unauthenticated);
        };

        let resource = self.mapper.resource(&request.path, rule.resource.as_ref());
        let action = rule
            .action
            .clone()
            .unwrap_or_else(|| self.mapper.action(&request.method));

        let domain = rule
            .domain
            .clone()
            .or_else(|| resolve_domain(rule.level, request));

        let Some(domain) = domain else {
            let policy = rule.missing_domain.unwrap_or(self.missing_domain);
            let event = AuthzAuditEvent::new(Some(user), rule.level, AuditOutcome::Skipped)
                .with_target(&resource, &action)
                .with_reason(DenyReason::MissingDomain.as_str());

            return Ok(match policy {
                MissingDomain::Skip => {
                    event.log();
                    Outcome::Skipped { level: rule.level }
                }
                MissingDomain::Deny => {
                    AuthzAuditEvent {
                        outcome: AuditOutcome::Denied,
                        ..event
                    }
                    .log();
                    Outcome::Denied(Denial {
                        level: rule.level,
                        domain: None,
                        resource,
                        action,
                        reason: DenyReason::MissingDomain,
                    })
                }
            });
        };

        match self.enforcer.check(user, &domain, &resource, &action).await {
            Ok(true) => {
                AuthzAuditEvent::new(Some(user), rule.level, AuditOutcome::Granted)
                    .with_domain(&domain)
                    .with_target(&resource, &action)
                    .log();
                Ok(Outcome::Allowed(DecisionContext {
                    principal: user.clone(),
                    domain,
                    resource,
                    action,
                }))
            }
            Ok(false) => {
                AuthzAuditEvent::new(Some(user), rule.level, AuditOutcome::Denied)
                    .with_domain(&domain)
                    .with_target(&resource, &action)
                    .with_reason(DenyReason::NoMatchingPolicy.as_str())
                    .log();
                Ok(Outcome::Denied(Denial {
                    level: rule.level,
                    domain: Some(domain),
                    resource,
                    action,
                    reason: DenyReason::NoMatchingPolicy,
                }))
            }
            Err(err) => {
                AuthzAuditEvent::new(Some(user), rule.level, AuditOutcome::Error)
                    .with_domain(&domain)
                    .with_target(&resource, &action)
                    .with_reason(err.to_string())
                    .log();
                Err(err)
            }
        }
    }
}
