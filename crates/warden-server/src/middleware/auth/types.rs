//! Authentication types.

use warden_authz::UserId;

/// Authenticated user context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
}

impl AuthUser {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }

    /// Parse a forwarded principal: `42` or `user:42`.
    pub fn from_header_value(value: &str) -> Option<Self> {
        UserId::new(value.trim()).ok().map(Self::new)
    }
}
