use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, CookieConfig, SecurityConfig};
use crate::handlers;
use crate::upstream::{HttpUpstream, Upstream, ORGANIZATION_ID_HEADER};

/// Per-process state shared by every handler. Holds no per-session data.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
    pub cookies: CookieConfig,
    pub binary_timeout_secs: u64,
    pub upstream_host: String,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let upstream =
            HttpUpstream::new(&config.upstream).context("failed to build upstream HTTP client")?;

        Ok(Self {
            upstream: Arc::new(upstream),
            cookies: config.cookies.clone(),
            binary_timeout_secs: config.upstream.binary_timeout_secs,
            upstream_host: config.upstream.base_url.host_str().unwrap_or_default().to_string(),
        })
    }
}

pub fn router(state: AppState, security: &SecurityConfig) -> Router {
    Router::new()
        // Public
        .route("/health", get(handlers::health))
        // Session lifecycle
        .merge(auth_routes())
        // Pass-through resources
        .merge(proxy_routes())
        .with_state(state)
        // Global middleware
        .layer(cors_layer(security))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/switch-organization", post(auth::switch_organization))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
}

fn proxy_routes() -> Router<AppState> {
    use handlers::{images, proxy};

    Router::new()
        .route("/auth/me", get(proxy::forward))
        .route("/auth/register", post(proxy::forward))
        .route("/organizations", any(proxy::forward))
        .route("/organizations/*path", any(proxy::forward))
        .route("/images/*path", get(images::relay))
}

/// Cookies must cross the CORS boundary, so origins are listed explicitly
/// and credentials are allowed.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ORGANIZATION_ID_HEADER])
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state, &config.security);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(
        environment = ?config.environment,
        upstream = %config.upstream.base_url,
        "session gateway listening on http://{}",
        bind_addr
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
