// Gateway error taxonomy
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::envelope::UpstreamRejection;

/// Every way a gateway request can fail.
///
/// Only `Upstream` carries information from the backend; all other variants
/// are produced locally and rendered with a fixed, client-safe message.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // 400 Bad Request, resolved before contacting upstream
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: &'static str,
    },

    // Relayed status and body
    #[error("upstream rejected the request with status {}", .0.status)]
    Upstream(UpstreamRejection),

    // 503 Service Unavailable
    #[error("upstream unreachable: {0}")]
    Connectivity(String),

    // 504 Gateway Timeout
    #[error("upstream timed out: {0}")]
    Timeout(String),

    // 500 Internal Server Error
    #[error("unexpected gateway failure: {0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn missing_credentials() -> Self {
        GatewayError::Validation {
            code: "MISSING_CREDENTIALS",
            message: "Email and password are required",
        }
    }

    pub fn no_refresh_token() -> Self {
        // 401, not 400: there is no credential to validate.
        GatewayError::Upstream(UpstreamRejection::local(
            StatusCode::UNAUTHORIZED,
            "NO_REFRESH_TOKEN",
            "No refresh token provided",
        ))
    }

    pub fn missing_email() -> Self {
        GatewayError::Validation {
            code: "MISSING_EMAIL",
            message: "Email is required",
        }
    }

    pub fn missing_reset_fields() -> Self {
        GatewayError::Validation {
            code: "MISSING_FIELDS",
            message: "Reset token and new password are required",
        }
    }

    pub fn missing_organization() -> Self {
        GatewayError::Validation {
            code: "MISSING_ORGANIZATION_ID",
            message: "Organization ID is required",
        }
    }

    pub fn unexpected(detail: impl Into<String>) -> Self {
        GatewayError::Unexpected(detail.into())
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(rejection) => rejection.status,
            GatewayError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> Option<&str> {
        match self {
            GatewayError::Validation { code, .. } => Some(*code),
            GatewayError::Upstream(rejection) => rejection.error_code.as_deref(),
            GatewayError::Connectivity(_) => Some("CONNECTION_ERROR"),
            GatewayError::Timeout(_) => Some("UPSTREAM_TIMEOUT"),
            GatewayError::Unexpected(_) => Some("INTERNAL_ERROR"),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            GatewayError::Validation { code, message } => json!({
                "success": false,
                "error": message,
                "error_code": code,
            }),
            GatewayError::Upstream(rejection) => rejection.body.clone(),
            GatewayError::Connectivity(_) => json!({
                "success": false,
                "error": "Unable to connect to the authentication service. Please try again later.",
                "error_code": "CONNECTION_ERROR",
            }),
            GatewayError::Timeout(_) => json!({
                "success": false,
                "error": "The upstream service did not respond in time",
                "error_code": "UPSTREAM_TIMEOUT",
            }),
            GatewayError::Unexpected(_) => json!({
                "success": false,
                "error": "An unexpected error occurred",
                "error_code": "INTERNAL_ERROR",
            }),
        }
    }
}

/// Transport-level failures talking to upstream, before any response exists.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid upstream path '{0}'")]
    InvalidPath(String),
}

/// Anything that fails before a response exists counts as unreachable,
/// including connect timeouts. [`ForwardError::Timeout`] is reserved for the
/// deadline a caller puts on the whole exchange.
impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_request() || err.is_timeout() {
            ForwardError::Connect(err.to_string())
        } else {
            ForwardError::Transport(err.to_string())
        }
    }
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Connect(msg) => GatewayError::Connectivity(msg),
            ForwardError::Timeout(msg) => GatewayError::Timeout(msg),
            other => GatewayError::Unexpected(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            GatewayError::Upstream(rejection) => {
                tracing::warn!(
                    status = %rejection.status,
                    error_code = rejection.error_code.as_deref().unwrap_or("-"),
                    "upstream rejected request"
                );
            }
            GatewayError::Validation { code, .. } => {
                tracing::debug!(error_code = *code, "request failed validation");
            }
            // Internal detail stays in the log, never in the body.
            other => tracing::error!(error = %other, "gateway request failed"),
        }

        (self.status_code(), Json(self.to_json())).into_response()
    }
}
