//! Session issuer: login, signup, social exchange, refresh and logout.
//!
//! The only component that mints token pairs and writes the Refresh Store.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::jwt::{IssuedToken, TokenCodec, TokenKind};
use super::social::{ProviderError, ProviderIdentity, SocialProvider};
use super::store::{RefreshStore, TokenDigest};
use crate::error::AuthError;
use crate::models::{CompleteOnboardingRequest, NewUser, SignupRequest, TokenPairResponse};
use crate::services::UserDirectory;

/// A freshly minted access/refresh pair for one user.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: Uuid,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

impl From<IssuedSession> for TokenPairResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            user_id: session.user_id,
            access_token: session.access.token,
            refresh_token: session.refresh.token,
            access_expires_at: session.access.expires_at,
            refresh_expires_at: session.refresh.expires_at,
        }
    }
}

/// Provider-supplied data used to prefill the profile completion form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingPrefill {
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug)]
pub enum SocialOutcome {
    Session(IssuedSession),
    OnboardingRequired(OnboardingPrefill),
}

pub struct SessionIssuer {
    codec: Arc<TokenCodec>,
    refresh_store: Arc<dyn RefreshStore>,
    users: Arc<dyn UserDirectory>,
    social: Arc<dyn SocialProvider>,
}

impl SessionIssuer {
    pub fn new(
        codec: Arc<TokenCodec>,
        refresh_store: Arc<dyn RefreshStore>,
        users: Arc<dyn UserDirectory>,
        social: Arc<dyn SocialProvider>,
    ) -> Self {
        Self {
            codec,
            refresh_store,
            users,
            social,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let Some(user) = self.users.authenticate(email, password).await? else {
            // Same outcome for unknown email and wrong password.
            warn!("login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let session = self.start_session(user.id).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(session)
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<IssuedSession, AuthError> {
        request.validate()?;

        let user = self
            .users
            .create(NewUser {
                email: request.email,
                display_name: request.display_name,
                password: Some(request.password),
            })
            .await?;

        let session = self.start_session(user.id).await?;
        info!(user_id = %user.id, "signup succeeded");
        Ok(session)
    }

    /// Maps a verified provider identity onto a local account by email.
    /// Unknown emails yield onboarding data and no tokens.
    pub async fn social_exchange(&self, provider_token: &str) -> Result<SocialOutcome, AuthError> {
        let identity = self.verify_provider(provider_token).await?;

        match self.users.find_by_email(&identity.email).await? {
            Some(user) => {
                let session = self.start_session(user.id).await?;
                info!(user_id = %user.id, "social exchange succeeded");
                Ok(SocialOutcome::Session(session))
            }
            None => {
                info!("social exchange requires onboarding");
                Ok(SocialOutcome::OnboardingRequired(OnboardingPrefill {
                    email: identity.email,
                    display_name: identity.name,
                }))
            }
        }
    }

    /// Creates the local profile for a provider identity, then starts a session.
    pub async fn complete_onboarding(
        &self,
        request: CompleteOnboardingRequest,
    ) -> Result<IssuedSession, AuthError> {
        request.validate()?;
        let identity = self.verify_provider(&request.provider_token).await?;

        let user = self
            .users
            .create(NewUser {
                email: identity.email,
                display_name: request.display_name,
                password: None,
            })
            .await?;

        let session = self.start_session(user.id).await?;
        info!(user_id = %user.id, "onboarding completed");
        Ok(session)
    }

    /// Single-use rotation: the presented token must verify and equal the
    /// stored value, and is replaced in the same step.
    pub async fn refresh(&self, presented: &str) -> Result<IssuedSession, AuthError> {
        let user_id = self
            .codec
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| {
                warn!(reason = %e, "refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        let session = self.mint(user_id)?;
        let rotated = self
            .refresh_store
            .rotate(
                user_id,
                &TokenDigest::of(presented),
                &TokenDigest::of(&session.refresh.token),
                session.refresh.expires_at,
            )
            .await?;

        if !rotated {
            warn!(user_id = %user_id, "refresh token superseded or revoked");
            return Err(AuthError::InvalidRefreshToken);
        }

        info!(user_id = %user_id, "session refreshed");
        Ok(session)
    }

    /// Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.refresh_store.clear(user_id).await?;
        info!(user_id = %user_id, "logged out");
        Ok(())
    }

    /// Logout for callers whose access token has lapsed. Only the current
    /// refresh token ends the session; a superseded one changes nothing.
    pub async fn logout_with_refresh(&self, presented: &str) -> Result<(), AuthError> {
        let user_id = self
            .codec
            .verify(presented, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        if self
            .refresh_store
            .clear_if_current(user_id, &TokenDigest::of(presented))
            .await?
        {
            info!(user_id = %user_id, "logged out");
        } else {
            warn!(user_id = %user_id, "logout with superseded refresh token ignored");
        }
        Ok(())
    }

    /// Administrative revocation; the user must log in again.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.refresh_store.clear(user_id).await?;
        warn!(user_id = %user_id, "refresh token revoked");
        Ok(())
    }

    async fn start_session(&self, user_id: Uuid) -> Result<IssuedSession, AuthError> {
        let session = self.mint(user_id)?;
        self.refresh_store
            .put(
                user_id,
                &TokenDigest::of(&session.refresh.token),
                session.refresh.expires_at,
            )
            .await?;
        Ok(session)
    }

    fn mint(&self, user_id: Uuid) -> Result<IssuedSession, AuthError> {
        Ok(IssuedSession {
            user_id,
            access: self.codec.issue(user_id, TokenKind::Access)?,
            refresh: self.codec.issue(user_id, TokenKind::Refresh)?,
        })
    }

    async fn verify_provider(
        &self,
        provider_token: &str,
    ) -> Result<ProviderIdentity, AuthError> {
        self.social.verify(provider_token).await.map_err(|e| {
            match &e {
                ProviderError::Transport(_) => warn!(error = %e, "social provider unreachable"),
                _ => warn!(error = %e, "provider token rejected"),
            }
            AuthError::InvalidProviderToken
        })
    }
}
