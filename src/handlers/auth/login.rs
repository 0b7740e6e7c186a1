use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::cookies::SessionJar;
use crate::session::{self, LoginRequest};

/// POST /auth/login - Exchange email/password for session cookies
///
/// Expected Input:
/// ```json
/// { "email": "string", "password": "string" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// { "success": true, "user": { ... }, "message": "Login successful" }
/// ```
///
/// Sets `access_token` and `refresh_token` cookies on success. A malformed
/// body is treated the same as missing credentials.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mut store = SessionJar::new(jar, &state.cookies);

    let result = session::login(state.upstream.as_ref(), &mut store, &state.cookies, request)
        .await
        .map(Json);

    (store.into_jar(), result)
}
