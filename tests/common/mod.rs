#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum_extra::extract::cookie::Cookie;
use reqwest::{header::SET_COOKIE, Response, StatusCode};
use session_gateway::app::{self, AppState};
use session_gateway::config::AppConfig;
use url::Url;
use wiremock::MockServer;

pub struct TestGateway {
    pub port: u16,
    pub base_url: String,
    pub upstream: MockServer,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of requests the fake upstream has seen so far.
    pub async fn upstream_calls(&self) -> usize {
        self.upstream
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Start a fresh gateway in-process, pointed at its own wiremock upstream.
pub async fn spawn_gateway() -> Result<TestGateway> {
    spawn_gateway_with(|config| config).await
}

pub async fn spawn_gateway_with(tweak: impl FnOnce(AppConfig) -> AppConfig) -> Result<TestGateway> {
    let upstream = MockServer::start().await;

    let base_url = Url::parse(&format!("{}/api/v1/", upstream.uri()))?;
    let config = tweak(AppConfig::development(base_url));

    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    let state = AppState::from_config(&config)?;
    let router = app::router(state, &config.security);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let gateway = TestGateway {
        port,
        base_url: format!("http://127.0.0.1:{}", port),
        upstream,
        client: reqwest::Client::new(),
    };
    wait_ready(&gateway, Duration::from_secs(5)).await?;
    Ok(gateway)
}

async fn wait_ready(gateway: &TestGateway, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() > deadline {
            break;
        }
        if let Ok(resp) = gateway.client.get(gateway.url("/health")).send().await {
            if resp.status() == StatusCode::OK {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("gateway did not become ready on {} within {:?}", gateway.base_url, timeout)
}

/// A fake upstream that accepts connections and closes them without answering.
pub async fn spawn_hangup_upstream() -> Result<String> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("failed to bind hangup listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    Ok(format!("http://{addr}/api/v1"))
}

/// All `Set-Cookie` headers of a response, parsed.
pub fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .collect()
}

pub fn find_cookie<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|c| c.name() == name)
}

/// Assert a cookie was cleared: empty value, `Max-Age=0`.
pub fn assert_cleared(cookies: &[Cookie<'static>], name: &str) {
    let cookie = find_cookie(cookies, name)
        .unwrap_or_else(|| panic!("expected Set-Cookie for {name}, got {cookies:?}"));
    assert_eq!(cookie.value(), "", "{name} should be emptied");
    assert_eq!(
        cookie.max_age(),
        Some(time::Duration::ZERO),
        "{name} should expire immediately"
    );
}
