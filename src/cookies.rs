use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::CookieConfig;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// The two browser-held session slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCookie {
    Access,
    Refresh,
}

impl SessionCookie {
    pub fn name(self) -> &'static str {
        match self {
            SessionCookie::Access => ACCESS_COOKIE_NAME,
            SessionCookie::Refresh => REFRESH_COOKIE_NAME,
        }
    }
}

/// Write access to the browser's session cookies.
///
/// Flows in [`crate::session`] only ever mutate cookies through this trait.
pub trait CookieStore: Send {
    fn set(&mut self, slot: SessionCookie, value: String, max_age: Duration);
    fn clear(&mut self, slot: SessionCookie);

    fn set_pair(
        &mut self,
        access: String,
        access_ttl: Duration,
        refresh: String,
        refresh_ttl: Duration,
    ) {
        self.set(SessionCookie::Access, access, access_ttl);
        self.set(SessionCookie::Refresh, refresh, refresh_ttl);
    }

    fn clear_all(&mut self) {
        self.clear(SessionCookie::Access);
        self.clear(SessionCookie::Refresh);
    }
}

/// [`CookieStore`] over the request's [`CookieJar`].
///
/// The jar only emits `Set-Cookie` for slots that were actually touched.
pub struct SessionJar {
    jar: CookieJar,
    secure: bool,
}

impl SessionJar {
    pub fn new(jar: CookieJar, config: &CookieConfig) -> Self {
        Self {
            jar,
            secure: config.secure,
        }
    }

    pub fn get(&self, slot: SessionCookie) -> Option<String> {
        self.jar
            .get(slot.name())
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl CookieStore for SessionJar {
    fn set(&mut self, slot: SessionCookie, value: String, max_age: Duration) {
        let jar = std::mem::replace(&mut self.jar, CookieJar::new());
        self.jar = jar.add(session_cookie(slot, value, max_age, self.secure));
    }

    fn clear(&mut self, slot: SessionCookie) {
        let jar = std::mem::replace(&mut self.jar, CookieJar::new());
        self.jar = jar.add(session_cookie(slot, String::new(), Duration::ZERO, self.secure));
    }
}

/// Build one session cookie with the fixed attribute policy.
///
/// Removal uses the same attributes with `Max-Age=0` so browsers match the slot.
pub fn session_cookie(
    slot: SessionCookie,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((slot.name(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Upstream TTL in seconds, or the configured default when absent or non-positive.
pub fn ttl_or_default(upstream_secs: Option<i64>, default_secs: i64) -> Duration {
    match upstream_secs {
        Some(secs) if secs > 0 => Duration::seconds(secs),
        _ => Duration::seconds(default_secs),
    }
}
