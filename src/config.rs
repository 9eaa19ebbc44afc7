//! Runtime configuration loaded from the environment

use std::env;
use std::fmt;

use chrono::Duration;

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 14 * 24 * 60 * 60;
const MIN_SECRET_LEN: usize = 32;
const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Token and cookie settings consumed by the auth core.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub cookie_secure: bool,
    pub access_cookie: bool,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .field("access_cookie", &self.access_cookie)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            cookie_secure: true,
            access_cookie: true,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        let config = Self {
            jwt_secret,
            access_ttl: Duration::seconds(parse_or("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?),
            refresh_ttl: Duration::seconds(parse_or(
                "REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TTL_SECS,
            )?),
            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            access_cookie: parse_or("ACCESS_TOKEN_COOKIE", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        if self.access_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_TTL_SECS",
                reason: "must be positive".to_string(),
            });
        }
        if self.refresh_ttl <= self.access_ttl {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_TTL_SECS",
                reason: "must exceed the access token lifetime".to_string(),
            });
        }
        Ok(())
    }
}

/// Full server configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub social_userinfo_url: String,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            port: parse_or("PORT", 3001)?,
            cors_allowed_origins,
            social_userinfo_url: env::var("SOCIAL_USERINFO_URL")
                .unwrap_or_else(|_| DEFAULT_USERINFO_URL.to_string()),
            auth: AuthConfig::from_env()?,
        })
    }
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
