// handlers/proxy.rs - Generic authenticated resource proxy
//
// Organizations, memberships, invite/activation codes, join requests and audit
// logs all share this one handler: same method, path, query and body upstream,
// identity headers copied verbatim, status and body relayed unchanged.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::AppState;
use crate::error::{ForwardError, GatewayError};
use crate::upstream::{AuthContext, UpstreamRequest};

/// ANY /organizations/** (and other pass-through routes)
pub async fn forward(
    State(state): State<AppState>,
    auth: AuthContext,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request = UpstreamRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        auth,
        body: Some(body),
        timeout: None,
    };

    match state.upstream.send(request).await {
        Ok(response) => response.into_response(),
        Err(err) => proxy_failure(err),
    }
}

/// Transport failures on resource routes are a flat 500; only invalid paths
/// are reported as the caller's fault.
pub(crate) fn proxy_failure(err: ForwardError) -> Response {
    match err {
        ForwardError::InvalidPath(path) => {
            tracing::debug!(%path, "refusing to proxy path");
            GatewayError::Validation {
                code: "INVALID_PATH",
                message: "Invalid resource path",
            }
            .into_response()
        }
        other => {
            tracing::error!(error = %other, "resource proxy request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to reach upstream service",
                    "error_code": "PROXY_ERROR",
                })),
            )
                .into_response()
        }
    }
}
