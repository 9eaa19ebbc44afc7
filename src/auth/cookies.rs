use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::service::IssuedSession;
use crate::config::AuthConfig;

pub const REFRESH_COOKIE: &str = "refreshToken";
pub const ACCESS_COOKIE: &str = "accessToken";

/// Cookie settings derived from [`AuthConfig`].
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub mirror_access: bool,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl CookiePolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            secure: config.cookie_secure,
            mirror_access: config.access_cookie,
            access_ttl_secs: config.access_ttl.num_seconds(),
            refresh_ttl_secs: config.refresh_ttl.num_seconds(),
        }
    }

    /// Adds the refresh cookie and, when enabled, the access mirror cookie.
    pub fn attach(&self, jar: CookieJar, session: &IssuedSession) -> CookieJar {
        let refresh = Cookie::build((REFRESH_COOKIE, session.refresh.token.clone()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(self.refresh_ttl_secs))
            .build();
        let jar = jar.add(refresh);

        if !self.mirror_access {
            return jar;
        }
        // Readable by same-origin scripts so they can mirror it into the bearer header.
        let access = Cookie::build((ACCESS_COOKIE, session.access.token.clone()))
            .http_only(false)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(self.access_ttl_secs))
            .build();
        jar.add(access)
    }

    /// Emits removal cookies for both tokens.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        [REFRESH_COOKIE, ACCESS_COOKIE]
            .into_iter()
            .fold(jar, |jar, name| {
                jar.add(
                    Cookie::build((name, ""))
                        .path("/")
                        .max_age(Duration::ZERO)
                        .build(),
                )
            })
    }
}
