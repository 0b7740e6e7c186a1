use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::cookies::SessionJar;
use crate::session;

/// POST /auth/logout - Clear both session cookies. Always 200.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let mut store = SessionJar::new(jar, &state.cookies);
    let reply = session::logout(&mut store);
    (store.into_jar(), Json(reply))
}
