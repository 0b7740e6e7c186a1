// upstream.rs - Authenticated forwarding to the upstream identity/resource API

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde_json::Value;
use url::Url;

use crate::config::UpstreamConfig;
use crate::envelope::UpstreamOutcome;
use crate::error::ForwardError;

pub const ORGANIZATION_ID_HEADER: HeaderName = HeaderName::from_static("x-organization-id");

/// Identity material taken verbatim from the inbound request.
///
/// Never parsed or validated here; upstream decides what it means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    pub cookie: Option<HeaderValue>,
    pub authorization: Option<HeaderValue>,
    pub organization_id: Option<HeaderValue>,
}

impl AuthContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookie: cookie_header(headers),
            authorization: headers.get(AUTHORIZATION).cloned(),
            organization_id: headers.get(&ORGANIZATION_ID_HEADER).cloned(),
        }
    }

    /// Headers for the outbound request: JSON content negotiation plus
    /// whichever identity headers the caller sent.
    pub fn forwarding_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(cookie) = &self.cookie {
            headers.insert(COOKIE, cookie.clone());
        }
        if let Some(authorization) = &self.authorization {
            headers.insert(AUTHORIZATION, authorization.clone());
        }
        if let Some(organization_id) = &self.organization_id {
            headers.insert(ORGANIZATION_ID_HEADER, organization_id.clone());
        }

        headers
    }
}

/// HTTP/2 clients may split cookies over several headers; they are rejoined
/// with `; `. A single header is passed through untouched.
fn cookie_header(headers: &HeaderMap) -> Option<HeaderValue> {
    let mut values = headers.get_all(COOKIE).iter();
    let first = values.next()?;
    let rest: Vec<&HeaderValue> = values.collect();
    if rest.is_empty() {
        return Some(first.clone());
    }

    let mut joined = first.as_bytes().to_vec();
    for value in rest {
        joined.extend_from_slice(b"; ");
        joined.extend_from_slice(value.as_bytes());
    }
    HeaderValue::from_bytes(&joined).ok()
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthContext::from_headers(&parts.headers))
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path relative to the configured base URL.
    pub path: String,
    pub query: Option<String>,
    pub auth: AuthContext,
    pub body: Option<Bytes>,
    /// Hard deadline for the whole exchange; `None` uses the transport default.
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn post_json(path: &str, auth: AuthContext, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: None,
            auth,
            body: Some(Bytes::from(body.to_string())),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn outcome(&self) -> UpstreamOutcome {
        UpstreamOutcome::from_parts(self.status, &self.body)
    }
}

/// Relay status and body unchanged.
impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let content_type = self
            .content_type
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        (self.status, [(CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError>;
}

/// [`Upstream`] over a shared `reqwest` client. No retries.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn url_for(&self, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(is_dot_segment) {
            return Err(ForwardError::InvalidPath(path.to_string()));
        }

        let mut url = self
            .base_url
            .join(relative)
            .map_err(|_| ForwardError::InvalidPath(path.to_string()))?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        let url = self.url_for(&request.path, request.query.as_deref())?;
        tracing::debug!(method = %request.method, path = %url.path(), "forwarding to upstream");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.auth.forwarding_headers());

        if let Some(body) = request.body {
            if carries_body(&request.method) && !body.is_empty() {
                builder = builder.body(body);
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        match request.timeout {
            // Dropping the in-flight future on expiry cancels the request.
            Some(deadline) => tokio::time::timeout(deadline, self.execute(request))
                .await
                .map_err(|_| {
                    ForwardError::Timeout(format!("no response within {}s", deadline.as_secs()))
                })?,
            None => self.execute(request).await,
        }
    }
}

/// `.`/`..`, including the percent-encoded forms URL parsing would resolve.
fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | ".." | "%2e" | "%2e%2e" | ".%2e" | "%2e."
    )
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> HttpUpstream {
        HttpUpstream::new(&UpstreamConfig {
            base_url: Url::parse("http://upstream.test/api/v1/").unwrap(),
            connect_timeout_secs: 1,
            binary_timeout_secs: 30,
        })
        .unwrap()
    }

    #[test]
    fn test_forwarding_headers_copy_identity_verbatim() {
        let mut inbound = HeaderMap::new();
        inbound.insert(COOKIE, HeaderValue::from_static("access_token=a; theme=dark"));
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        inbound.insert(&ORGANIZATION_ID_HEADER, HeaderValue::from_static("org-9"));

        let headers = AuthContext::from_headers(&inbound).forwarding_headers();
        assert_eq!(headers[COOKIE], "access_token=a; theme=dark");
        assert_eq!(headers[AUTHORIZATION], "Bearer xyz");
        assert_eq!(headers[&ORGANIZATION_ID_HEADER], "org-9");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "application/json");
    }

    #[test]
    fn test_forwarding_headers_omit_absent_identity() {
        let headers = AuthContext::from_headers(&HeaderMap::new()).forwarding_headers();
        assert!(headers.get(COOKIE).is_none());
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(&ORGANIZATION_ID_HEADER).is_none());
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_split_cookie_headers_are_joined() {
        let mut inbound = HeaderMap::new();
        inbound.append(COOKIE, HeaderValue::from_static("a=1"));
        inbound.append(COOKIE, HeaderValue::from_static("b=2"));
        let ctx = AuthContext::from_headers(&inbound);
        assert_eq!(ctx.cookie.unwrap(), "a=1; b=2");
    }

    #[test]
    fn test_url_for_keeps_query() {
        let url = upstream()
            .url_for("/organizations/42/members", Some("page=2&limit=10"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://upstream.test/api/v1/organizations/42/members?page=2&limit=10"
        );
    }

    #[test]
    fn test_url_for_rejects_traversal() {
        assert!(matches!(
            upstream().url_for("/organizations/../admin", None),
            Err(ForwardError::InvalidPath(_))
        ));
        assert!(matches!(
            upstream().url_for("/organizations/%2E%2e/admin", None),
            Err(ForwardError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_socket_dropped_before_response_is_a_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let upstream = HttpUpstream::new(&UpstreamConfig {
            base_url: Url::parse(&format!("http://{addr}/api/v1/")).unwrap(),
            connect_timeout_secs: 1,
            binary_timeout_secs: 30,
        })
        .unwrap();

        let result = upstream
            .send(UpstreamRequest::post_json(
                "auth/login",
                AuthContext::default(),
                serde_json::json!({"email": "a@example.com", "password": "pw"}),
            ))
            .await;
        assert!(matches!(result, Err(ForwardError::Connect(_))), "{result:?}");
    }

    #[test]
    fn test_carries_body() {
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::DELETE));
        assert!(!carries_body(&Method::GET));
    }
}
