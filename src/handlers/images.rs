use std::time::Duration;

use axum::{
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::{ForwardError, GatewayError};
use crate::upstream::{AuthContext, UpstreamRequest};

use super::proxy::proxy_failure;

/// GET /images/* - Relay binary image payloads
///
/// Bounded by the configured binary timeout (30s by default). On expiry the
/// upstream request is dropped and the caller gets 504.
pub async fn relay(
    State(state): State<AppState>,
    auth: AuthContext,
    uri: Uri,
) -> Response {
    let deadline = Duration::from_secs(state.binary_timeout_secs);
    let request = UpstreamRequest {
        method: Method::GET,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        auth,
        body: None,
        timeout: None,
    }
    .with_timeout(deadline);

    match state.upstream.send(request).await {
        Ok(response) => response.into_response(),
        Err(ForwardError::Timeout(detail)) => GatewayError::Timeout(format!(
            "image relay exceeded {}s: {detail}",
            deadline.as_secs()
        ))
        .into_response(),
        Err(err) => proxy_failure(err),
    }
}
