//! Session token lifecycle.
//!
//! Each flow talks to upstream through [`Upstream`] and touches browser
//! cookies only through [`CookieStore`], so the whole lifecycle can be driven
//! without an HTTP stack. Invariant: the two cookies are set or cleared
//! together, except on an organization switch, which may replace the access
//! cookie alone.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::CookieConfig;
use crate::cookies::{ttl_or_default, CookieStore, SessionCookie};
use crate::envelope::{UpstreamEnvelope, UpstreamOutcome};
use crate::error::GatewayError;
use crate::upstream::{AuthContext, Upstream, UpstreamRequest};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with that email, password reset instructions have been sent.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchOrganizationRequest {
    pub organization_id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Success body returned to the browser. Tokens never appear in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Value>,
    pub message: String,
}

impl SessionReply {
    fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            user: None,
            organization: None,
            message: message.into(),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Both tokens of a freshly issued pair, or an unexpected-error if upstream
/// claimed success without them.
fn token_pair(envelope: &UpstreamEnvelope) -> Result<(String, String), GatewayError> {
    match (
        present(envelope.access_token.clone()),
        present(envelope.refresh_token.clone()),
    ) {
        (Some(access), Some(refresh)) => Ok((access, refresh)),
        _ => Err(GatewayError::unexpected(
            "upstream reported success without a complete token pair",
        )),
    }
}

fn store_pair(
    cookies: &mut dyn CookieStore,
    policy: &CookieConfig,
    envelope: &UpstreamEnvelope,
) -> Result<(), GatewayError> {
    let (access, refresh) = token_pair(envelope)?;
    cookies.set_pair(
        access,
        ttl_or_default(envelope.expires_in, policy.access_ttl_secs),
        refresh,
        ttl_or_default(envelope.refresh_expires_in, policy.refresh_ttl_secs),
    );
    Ok(())
}

/// POST /auth/login - exchange credentials for a token pair.
///
/// Missing credentials are rejected locally with no cookie changes. An
/// upstream rejection clears both cookies and relays `error`, `error_code`,
/// and any `lock_minutes` / `status` upstream supplied.
pub async fn login(
    upstream: &dyn Upstream,
    cookies: &mut dyn CookieStore,
    policy: &CookieConfig,
    request: LoginRequest,
) -> Result<SessionReply, GatewayError> {
    let (Some(email), Some(password)) = (present(request.email), present(request.password)) else {
        return Err(GatewayError::missing_credentials());
    };

    let response = upstream
        .send(UpstreamRequest::post_json(
            "auth/login",
            AuthContext::default(),
            json!({ "email": email, "password": password }),
        ))
        .await?;

    match response.outcome() {
        UpstreamOutcome::Err(rejection) => {
            cookies.clear_all();
            Err(GatewayError::Upstream(rejection.summarized()))
        }
        UpstreamOutcome::Ok(envelope) => {
            store_pair(cookies, policy, &envelope)?;
            info!("login succeeded, session cookies issued");
            Ok(SessionReply {
                success: true,
                user: envelope.user,
                organization: None,
                message: envelope
                    .message
                    .unwrap_or_else(|| "Login successful".to_string()),
            })
        }
    }
}

/// POST /auth/refresh - rotate the token pair using the refresh cookie.
///
/// Every failure clears both cookies, so a dead refresh token is never
/// retried. Upstream invalidates the old refresh token on success; of two
/// concurrent refreshes with the same token, the loser takes this path.
pub async fn refresh(
    upstream: &dyn Upstream,
    cookies: &mut dyn CookieStore,
    policy: &CookieConfig,
    refresh_token: Option<String>,
) -> Result<SessionReply, GatewayError> {
    let result = match present(refresh_token) {
        Some(token) => rotate(upstream, cookies, policy, token).await,
        None => Err(GatewayError::no_refresh_token()),
    };

    if result.is_err() {
        cookies.clear_all();
    }
    result
}

async fn rotate(
    upstream: &dyn Upstream,
    cookies: &mut dyn CookieStore,
    policy: &CookieConfig,
    refresh_token: String,
) -> Result<SessionReply, GatewayError> {
    let response = upstream
        .send(UpstreamRequest::post_json(
            "auth/refresh",
            AuthContext::default(),
            json!({ "refresh_token": refresh_token }),
        ))
        .await?;

    match response.outcome() {
        UpstreamOutcome::Err(rejection) => Err(GatewayError::Upstream(rejection)),
        UpstreamOutcome::Ok(envelope) => {
            store_pair(cookies, policy, &envelope)?;
            info!("session tokens rotated");
            Ok(SessionReply {
                success: true,
                user: envelope.user,
                organization: None,
                message: envelope
                    .message
                    .unwrap_or_else(|| "Token refreshed successfully".to_string()),
            })
        }
    }
}

/// POST /auth/logout - clear both cookies. Never fails, never calls upstream.
pub fn logout(cookies: &mut dyn CookieStore) -> SessionReply {
    cookies.clear_all();
    SessionReply::message("Logged out successfully")
}

/// POST /auth/switch-organization - move the session to another organization.
///
/// Only the access cookie can change, and only when upstream issues a new
/// access token. Rejections are relayed without touching cookies.
pub async fn switch_organization(
    upstream: &dyn Upstream,
    cookies: &mut dyn CookieStore,
    policy: &CookieConfig,
    auth: AuthContext,
    request: SwitchOrganizationRequest,
) -> Result<SessionReply, GatewayError> {
    let organization_id = match request.organization_id {
        Some(Value::String(id)) if !id.trim().is_empty() => Value::String(id),
        Some(id @ Value::Number(_)) => id,
        _ => return Err(GatewayError::missing_organization()),
    };

    let response = upstream
        .send(UpstreamRequest::post_json(
            "auth/switch-organization",
            auth,
            json!({ "organization_id": organization_id }),
        ))
        .await?;

    let envelope = match response.outcome() {
        UpstreamOutcome::Err(rejection) => return Err(GatewayError::Upstream(rejection)),
        UpstreamOutcome::Ok(envelope) => envelope,
    };

    match present(envelope.access_token.clone()) {
        Some(token) => {
            cookies.set(
                SessionCookie::Access,
                token,
                ttl_or_default(envelope.expires_in, policy.access_ttl_secs),
            );
            info!("organization switched, access cookie replaced");
        }
        None => info!("organization switched, session cookies unchanged"),
    }

    Ok(SessionReply {
        success: true,
        user: None,
        organization: envelope.organization,
        message: envelope
            .message
            .unwrap_or_else(|| "Organization switched successfully".to_string()),
    })
}

/// POST /auth/forgot-password - start password recovery.
///
/// The reply is identical whether or not the address exists upstream, and
/// whether or not upstream could be reached. Only the missing-email check is
/// reported to the caller.
pub async fn forgot_password(
    upstream: &dyn Upstream,
    request: ForgotPasswordRequest,
) -> Result<SessionReply, GatewayError> {
    let Some(email) = present(request.email) else {
        return Err(GatewayError::missing_email());
    };

    match upstream
        .send(UpstreamRequest::post_json(
            "auth/forgot-password",
            AuthContext::default(),
            json!({ "email": email }),
        ))
        .await
    {
        Ok(response) => debug!(status = %response.status, "forgot-password forwarded"),
        Err(err) => warn!(error = %err, "forgot-password could not reach upstream"),
    }

    Ok(SessionReply::message(FORGOT_PASSWORD_MESSAGE))
}

/// POST /auth/reset-password - finish recovery with the emailed token.
///
/// Upstream failures (bad or expired token, weak password) are relayed as-is.
pub async fn reset_password(
    upstream: &dyn Upstream,
    request: ResetPasswordRequest,
) -> Result<SessionReply, GatewayError> {
    let (Some(token), Some(password)) = (present(request.token), present(request.password)) else {
        return Err(GatewayError::missing_reset_fields());
    };

    let response = upstream
        .send(UpstreamRequest::post_json(
            "auth/reset-password",
            AuthContext::default(),
            json!({ "token": token, "password": password }),
        ))
        .await?;

    match response.outcome() {
        UpstreamOutcome::Err(rejection) => Err(GatewayError::Upstream(rejection)),
        UpstreamOutcome::Ok(envelope) => Ok(SessionReply::message(
            envelope
                .message
                .unwrap_or_else(|| "Password has been reset successfully".to_string()),
        )),
    }
}
