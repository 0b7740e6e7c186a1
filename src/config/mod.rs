use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Default lifetime of the `access_token` cookie when upstream omits `expires_in`.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 24 * 60 * 60;
/// Default lifetime of the `refresh_token` cookie when upstream omits `refresh_expires_in`.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const DEVELOPMENT_UPSTREAM_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("UPSTREAM_API_URL is required in {0:?}")]
    MissingUpstreamUrl(Environment),

    #[error("invalid upstream URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub upstream: UpstreamConfig,
    pub cookies: CookieConfig,
    pub server: ServerConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: Url,
    pub connect_timeout_secs: u64,
    pub binary_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl AppConfig {
    /// Read the whole configuration once, at startup.
    ///
    /// Each environment starts from its own profile, then specific env vars
    /// override individual fields.
    ///
    /// An explicit `upstream_url` (the `--upstream-url` flag) takes precedence
    /// over `UPSTREAM_API_URL`.
    pub fn load(upstream_url: Option<&str>) -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        let requested = upstream_url
            .map(str::to_string)
            .or_else(|| env::var("UPSTREAM_API_URL").ok());

        let base_url = match requested {
            Some(v) => parse_base_url(&v)?,
            None if environment == Environment::Development => {
                parse_base_url(DEVELOPMENT_UPSTREAM_URL)?
            }
            None => return Err(ConfigError::MissingUpstreamUrl(environment)),
        };

        let config = match environment {
            Environment::Production => Self::production(base_url),
            Environment::Staging => Self::staging(base_url),
            Environment::Development => Self::development(base_url),
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Upstream overrides
        if let Ok(v) = env::var("UPSTREAM_CONNECT_TIMEOUT_SECS") {
            self.upstream.connect_timeout_secs = parse_var("UPSTREAM_CONNECT_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = env::var("UPSTREAM_BINARY_TIMEOUT_SECS") {
            self.upstream.binary_timeout_secs = parse_var("UPSTREAM_BINARY_TIMEOUT_SECS", &v)?;
        }

        // Cookie overrides
        if let Ok(v) = env::var("COOKIE_SECURE") {
            self.cookies.secure = parse_var("COOKIE_SECURE", &v)?;
        }
        if let Ok(v) = env::var("COOKIE_ACCESS_TTL_SECS") {
            self.cookies.access_ttl_secs = parse_var("COOKIE_ACCESS_TTL_SECS", &v)?;
        }
        if let Ok(v) = env::var("COOKIE_REFRESH_TTL_SECS") {
            self.cookies.refresh_ttl_secs = parse_var("COOKIE_REFRESH_TTL_SECS", &v)?;
        }

        // Server overrides
        if let Ok(v) = env::var("GATEWAY_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = parse_var("GATEWAY_PORT", &v)?;
        }

        // Security overrides
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(self)
    }

    /// Replace the upstream target, e.g. from a command-line flag.
    pub fn with_upstream_url(mut self, value: &str) -> Result<Self, ConfigError> {
        self.upstream.base_url = parse_base_url(value)?;
        Ok(self)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn development(base_url: Url) -> Self {
        Self {
            environment: Environment::Development,
            upstream: UpstreamConfig {
                base_url,
                connect_timeout_secs: 10,
                binary_timeout_secs: 30,
            },
            cookies: CookieConfig {
                secure: false,
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            },
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
        }
    }

    fn staging(base_url: Url) -> Self {
        Self {
            environment: Environment::Staging,
            upstream: UpstreamConfig {
                base_url,
                connect_timeout_secs: 10,
                binary_timeout_secs: 30,
            },
            cookies: CookieConfig {
                secure: true,
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            },
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production(base_url: Url) -> Self {
        Self {
            environment: Environment::Production,
            upstream: UpstreamConfig {
                base_url,
                connect_timeout_secs: 5,
                binary_timeout_secs: 30,
            },
            cookies: CookieConfig {
                secure: true,
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            },
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

/// Upstream paths are joined onto the base URL, so it must end with a slash.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        value: value.to_string(),
        source,
    })
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Url {
        parse_base_url("http://localhost:8000/api/v1").unwrap()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development(local());
        assert!(!config.cookies.secure);
        assert_eq!(config.cookies.access_ttl_secs, 86_400);
        assert_eq!(config.cookies.refresh_ttl_secs, 604_800);
        assert_eq!(config.upstream.binary_timeout_secs, 30);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production(local());
        assert!(config.cookies.secure);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("https://api.example.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
        assert_eq!(
            url.join("auth/login").unwrap().as_str(),
            "https://api.example.com/v1/auth/login"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_overrides_from_flags() {
        let config = AppConfig::development(local())
            .with_port(8081)
            .with_upstream_url("https://identity.internal")
            .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.upstream.base_url.as_str(), "https://identity.internal/");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        assert!(parse_var::<u64>("COOKIE_ACCESS_TTL_SECS", "soon").is_err());
        assert!(parse_var::<bool>("COOKIE_SECURE", "true").unwrap());
    }
}
