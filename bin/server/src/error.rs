//! Web-layer error responses.
//!
//! Every variant renders as JSON with a generic message. Detail stays in the
//! logs, written where the failure is detected.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Errors returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No identity was forwarded for the request.
    Unauthenticated,
    /// The identity lacks the group the route requires.
    Forbidden { group: String },
    /// Identity provider parameters could not be loaded.
    UpstreamConfig,
    /// No route matched.
    NotFound,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "authentication required"),
            Self::Forbidden { group } => write!(f, "membership in '{group}' required"),
            Self::UpstreamConfig => write!(f, "identity provider configuration unavailable"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Authentication required"})),
            )
                .into_response(),
            Self::Forbidden { group } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Forbidden",
                    "message": format!("Membership in group '{group}' is required"),
                })),
            )
                .into_response(),
            Self::UpstreamConfig => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to load configuration"})),
            )
                .into_response(),
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden {
                group: "administrators".to_string()
            }
            .into_response()
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::UpstreamConfig.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn display_names_group() {
        let err = ApiError::Forbidden {
            group: "administrators".to_string(),
        };
        assert!(err.to_string().contains("administrators"));
    }
}
