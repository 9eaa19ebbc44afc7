//! Third-party sign-in verification (relying-party side only)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Identity asserted by the provider for a live provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected the token")]
    Rejected,

    #[error("provider did not assert a verified email")]
    UnverifiedEmail,

    #[error("provider request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SocialProvider: Send + Sync {
    async fn verify(&self, provider_token: &str) -> Result<ProviderIdentity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
}

impl UserInfo {
    fn into_identity(self) -> Result<ProviderIdentity, ProviderError> {
        let email = match (self.email, self.email_verified) {
            (Some(email), Some(true)) if !email.trim().is_empty() => email,
            _ => return Err(ProviderError::UnverifiedEmail),
        };
        Ok(ProviderIdentity {
            subject: self.sub,
            email,
            name: self.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// OpenID userinfo-endpoint verifier: a token is valid if the provider
/// answers the userinfo call for it.
pub struct HttpSocialProvider {
    userinfo_url: String,
    http_client: reqwest::Client,
}

impl HttpSocialProvider {
    pub fn new(userinfo_url: impl Into<String>) -> Self {
        Self {
            userinfo_url: userinfo_url.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SocialProvider for HttpSocialProvider {
    async fn verify(&self, provider_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(provider_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "social provider rejected token");
            return Err(ProviderError::Rejected);
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?
            .into_identity()
    }
}
