use axum::{extract::State, response::IntoResponse, Json};

use crate::app::AppState;
use crate::session::{self, ForgotPasswordRequest, ResetPasswordRequest};

/// POST /auth/forgot-password - Request a reset email
///
/// Responds with the same success envelope whether or not the address is
/// known upstream. Only a missing `email` is reported (400).
pub async fn forgot_password(
    State(state): State<AppState>,
    body: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    session::forgot_password(state.upstream.as_ref(), request)
        .await
        .map(Json)
}

/// POST /auth/reset-password - Set a new password with an emailed token
///
/// Expected Input:
/// ```json
/// { "token": "string", "password": "string" }
/// ```
pub async fn reset_password(
    State(state): State<AppState>,
    body: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    session::reset_password(state.upstream.as_ref(), request)
        .await
        .map(Json)
}
