//! Error response implementation.

use super::types::ApiError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(
                error = %self,
                source = ?std::error::Error::source(&self),
                code = self.error_code(),
                "Server error occurred"
            );
        } else if matches!(self, ApiError::Unauthorized | ApiError::Forbidden { .. }) {
            warn!(
                error = %self,
                code = self.error_code(),
                "Auth error occurred"
            );
        }

        let status = self.status_code();
        let code = self.error_code();

        let (message, details) = match &self {
            ApiError::Forbidden {
                resource,
                action,
                domain,
            } => {
                let details = serde_json::json!({
                    "resource": resource,
                    "action": action,
                    "domain": domain,
                });
                (self.to_string(), Some(details))
            }
            // Never expose store internals to the caller.
            ApiError::Internal(_) => ("An internal error occurred".to_string(), None),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Conversion implementations
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
