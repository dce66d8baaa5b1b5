//! Authorization audit logging.

use crate::resolver::Level;
use crate::types::{Action, Domain, Resource, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// How a request left the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Granted,
    Denied,
    Skipped,
    Unauthenticated,
    Error,
}

/// One authorization decision. Never carries policy contents.
#[derive(Debug, Clone, Serialize)]
pub struct AuthzAuditEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub level: Level,
    pub domain: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
}

impl AuthzAuditEvent {
    pub fn new(user: Option<&UserId>, level: Level, outcome: AuditOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user.map(ToString::to_string),
            level,
            domain: None,
            resource: None,
            action: None,
            outcome,
            reason: None,
        }
    }

    pub fn with_domain(mut self, domain: &Domain) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_target(mut self, resource: &Resource, action: &Action) -> Self {
        self.resource = Some(resource.to_string());
        self.action = Some(action.to_string());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn log(&self) {
        match self.outcome {
            AuditOutcome::Granted => info!(
                event = "authz_granted",
                user_id = ?self.user_id,
                level = %self.level,
                domain = ?self.domain,
                resource = ?self.resource,
                action = ?self.action,
                "Authorization granted"
            ),
            AuditOutcome::Denied => warn!(
                event = "authz_denied",
                user_id = ?self.user_id,
                level = %self.level,
                domain = ?self.domain,
                resource = ?self.resource,
                action = ?self.action,
                reason = ?self.reason,
                "Authorization denied"
            ),
            AuditOutcome::Skipped => warn!(
                event = "authz_skipped",
                user_id = ?self.user_id,
                level = %self.level,
                reason = ?self.reason,
                "Authorization skipped: no domain"
            ),
            AuditOutcome::Unauthenticated => warn!(
                event = "authz_unauthenticated",
                level = %self.level,
                "Authorization check without authentication"
            ),
            AuditOutcome::Error => error!(
                event = "authz_error",
                user_id = ?self.user_id,
                level = %self.level,
                domain = ?self.domain,
                resource = ?self.resource,
                action = ?self.action,
                reason = ?self.reason,
                "Authorization failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_records_target_and_domain() {
        let user = UserId::new("user:3").unwrap();
        let event = AuthzAuditEvent::new(Some(&user), Level::Group, AuditOutcome::Denied)
            .with_domain(&Domain::group(5))
            .with_target(&Resource::new("files").unwrap(), &Action::delete())
            .with_reason("no_matching_policy");

        assert_eq!(event.user_id.as_deref(), Some("user:3"));
        assert_eq!(event.domain.as_deref(), Some("group:5"));
        assert_eq!(event.resource.as_deref(), Some("files"));
        assert_eq!(event.action.as_deref(), Some("delete"));
        assert_eq!(event.reason.as_deref(), Some("no_matching_policy"));
        event.log();
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let event = AuthzAuditEvent::new(None, Level::System, AuditOutcome::Unauthenticated);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "unauthenticated");
        assert_eq!(json["level"], "system");
        assert!(json["user_id"].is_null());
    }
}
