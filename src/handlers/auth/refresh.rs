use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::cookies::{SessionCookie, SessionJar};
use crate::session;

/// POST /auth/refresh - Rotate the session using the `refresh_token` cookie
///
/// No body. On any failure both session cookies are cleared in the same
/// response that carries the error.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let mut store = SessionJar::new(jar, &state.cookies);
    let refresh_token = store.get(SessionCookie::Refresh);

    let result = session::refresh(
        state.upstream.as_ref(),
        &mut store,
        &state.cookies,
        refresh_token,
    )
    .await
    .map(Json);

    (store.into_jar(), result)
}
