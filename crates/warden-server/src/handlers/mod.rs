//! Request handlers for the admin API.

pub mod permissions;
pub mod policies;
pub mod roles;

use serde::Serialize;

/// Result of an idempotent insert.
#[derive(Debug, Serialize)]
pub struct Inserted {
    pub inserted: bool,
}

/// Result of an idempotent delete.
#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: bool,
}
