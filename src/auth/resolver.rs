//! Credential resolver: turns request metadata into a verified user id.
//!
//! Precedence: `Authorization: Bearer` (access token), then the
//! `refreshToken` cookie (refresh token). A bearer header that parses is
//! final; its failure is reported as-is and the cookie is not consulted.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use headers::authorization::Bearer;
use headers::{Authorization, HeaderMapExt};
use tracing::debug;
use uuid::Uuid;

use super::cookies::REFRESH_COOKIE;
use super::jwt::{TokenCodec, TokenKind};
use super::store::{RefreshStore, TokenDigest};
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Bearer,
    RefreshCookie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedUser {
    pub user_id: Uuid,
    pub source: CredentialSource,
}

pub struct CredentialResolver {
    codec: Arc<TokenCodec>,
    refresh_store: Arc<dyn RefreshStore>,
}

impl CredentialResolver {
    pub fn new(codec: Arc<TokenCodec>, refresh_store: Arc<dyn RefreshStore>) -> Self {
        Self {
            codec,
            refresh_store,
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedUser, AuthError> {
        if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
            let user_id = self.codec.verify(bearer.token(), TokenKind::Access)?;
            return Ok(ResolvedUser {
                user_id,
                source: CredentialSource::Bearer,
            });
        }

        let jar = CookieJar::from_headers(headers);
        let Some(cookie) = jar.get(REFRESH_COOKIE) else {
            return Err(AuthError::Unauthenticated);
        };
        self.resolve_refresh_cookie(cookie.value()).await
    }

    /// Cookie-borne refresh tokens must also be the stored value, so a
    /// rotated-out or logged-out cookie does not authenticate.
    async fn resolve_refresh_cookie(&self, token: &str) -> Result<ResolvedUser, AuthError> {
        let user_id = match self.codec.verify(token, TokenKind::Refresh) {
            Ok(user_id) => user_id,
            Err(e) => {
                debug!(reason = %e, "refresh cookie rejected");
                return Err(AuthError::Unauthenticated);
            }
        };

        let stored = self.refresh_store.get(user_id).await?;
        if stored.as_ref() != Some(&TokenDigest::of(token)) {
            debug!(user_id = %user_id, "refresh cookie is not the current token");
            return Err(AuthError::Unauthenticated);
        }

        Ok(ResolvedUser {
            user_id,
            source: CredentialSource::RefreshCookie,
        })
    }
}
