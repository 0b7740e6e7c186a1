use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::cookies::SessionJar;
use crate::session::{self, SwitchOrganizationRequest};
use crate::upstream::AuthContext;

/// POST /auth/switch-organization - Change the active organization
///
/// Expected Input:
/// ```json
/// { "organization_id": "string | number" }
/// ```
///
/// The caller's cookie / bearer credentials are forwarded untouched. Only the
/// `access_token` cookie may change, and only if upstream issued a new one.
pub async fn switch_organization(
    State(state): State<AppState>,
    auth: AuthContext,
    jar: CookieJar,
    body: Option<Json<SwitchOrganizationRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mut store = SessionJar::new(jar, &state.cookies);

    let result = session::switch_organization(
        state.upstream.as_ref(),
        &mut store,
        &state.cookies,
        auth,
        request,
    )
    .await
    .map(Json);

    (store.into_jar(), result)
}
