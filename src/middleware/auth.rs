//! Request extractors built on the credential resolver.
//!
//! ```rust,ignore
//! async fn protected(user: AuthenticatedUser) -> impl IntoResponse { ... }
//! async fn public(OptionalUser(user): OptionalUser) -> impl IntoResponse { ... }
//! async fn admin_only(admin: AdminUser) -> impl IntoResponse { ... }
//! ```

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use uuid::Uuid;

use crate::auth::{AuthorizationGate, CredentialResolver, CredentialSource, ResolvedUser};
use crate::error::AuthError;

/// Resolves credentials once per request; later extractors reuse the result.
async fn resolve<S>(parts: &mut Parts, state: &S) -> Result<ResolvedUser, AuthError>
where
    Arc<CredentialResolver>: FromRef<S>,
{
    if let Some(resolved) = parts.extensions.get::<ResolvedUser>() {
        return Ok(*resolved);
    }
    let resolver = Arc::<CredentialResolver>::from_ref(state);
    let resolved = resolver.resolve(&parts.headers).await?;
    parts.extensions.insert(resolved);
    Ok(resolved)
}

/// Rejects with the resolver's typed error when no credential verifies.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub ResolvedUser);

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }

    pub fn source(&self) -> CredentialSource {
        self.0.source
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<CredentialResolver>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(AuthenticatedUser)
    }
}

/// For public routes with optional personalisation.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<ResolvedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
    Arc<CredentialResolver>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await {
            Ok(resolved) => Ok(OptionalUser(Some(resolved))),
            Err(AuthError::Internal(detail)) => Err(AuthError::Internal(detail)),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}

/// Authenticated user whose admin flag is set right now.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub ResolvedUser);

impl AdminUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<CredentialResolver>: FromRef<S>,
    Arc<AuthorizationGate>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolved = resolve(parts, state).await?;
        Arc::<AuthorizationGate>::from_ref(state)
            .require_admin(resolved.user_id)
            .await?;
        Ok(AdminUser(resolved))
    }
}
