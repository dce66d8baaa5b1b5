//! Error types for the authorization engine.

use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors raised by the stores and the enforcer.
///
/// A denied check is not an error; it is a `false` decision.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A subject, role, domain, resource or action string failed validation.
    #[error("Invalid {kind}: {value:?}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
    },

    /// Role assignments are always bound to a concrete domain.
    #[error("Role assignments require a concrete domain, got {0}")]
    AssignmentRequiresConcreteDomain(String),

    /// The backing store failed.
    #[cfg(feature = "postgres")]
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Migration of the backing store failed.
    #[cfg(feature = "postgres")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Any other internal failure.
    #[error("Internal authorization error: {0}")]
    Internal(String),
}

impl AuthzError {
    pub(crate) fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.into(),
        }
    }

    /// True when the error was caused by bad input rather than a failing backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. } | Self::AssignmentRequiresConcreteDomain(_)
        )
    }
}
