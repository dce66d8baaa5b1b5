//! Error handling for the Warden API server.

pub mod response;
pub mod types;

pub use types::{ApiError, ApiResult};
