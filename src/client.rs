//! Client side of the silent-refresh protocol.
//!
//! A protected call rejected for an expired or unverifiable access token
//! triggers exactly one refresh and one retry. If the refresh fails the session is over and the caller
//! must sign in again.

use std::future::Future;
use std::sync::RwLock;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::is_refreshable_code;
use crate::models::{ApiResponse, TokenPairResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("session terminated; sign in again")]
    SessionTerminated,

    #[error("request failed with status {0}")]
    Status(u16),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Outcome of one attempt. `Unauthorized` carries whatever the refresh step
/// needs to know about the failed attempt.
pub enum Attempt<T, S> {
    Done(T),
    Unauthorized(S),
}

/// Runs `attempt`; on an authentication failure runs `refresh` once and
/// retries once. A second authentication failure ends the session.
pub async fn retry_after_refresh<T, S, A, AFut, R, RFut>(
    mut attempt: A,
    refresh: R,
) -> Result<T, ClientError>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = Result<Attempt<T, S>, ClientError>>,
    R: FnOnce(S) -> RFut,
    RFut: Future<Output = Result<(), ClientError>>,
{
    let stale = match attempt().await? {
        Attempt::Done(value) => return Ok(value),
        Attempt::Unauthorized(stale) => stale,
    };

    refresh(stale).await?;

    match attempt().await? {
        Attempt::Done(value) => Ok(value),
        Attempt::Unauthorized(_) => Err(ClientError::SessionTerminated),
    }
}

#[derive(Debug, Clone)]
struct ClientTokens {
    access: String,
    refresh: String,
}

/// HTTP client that carries a token pair and refreshes it silently.
///
/// Requests that fail together share one refresh: the refresh lock is taken
/// in turn and a caller whose stale token was already replaced just retries.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    tokens: RwLock<Option<ClientTokens>>,
    refresh_lock: Mutex<()>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn set_session(&self, pair: &TokenPairResponse) {
        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = Some(ClientTokens {
            access: pair.access_token.clone(),
            refresh: pair.refresh_token.clone(),
        });
    }

    pub fn clear_session(&self) {
        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| t.access.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| t.refresh.clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPairResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let pair: TokenPairResponse = read_data(response).await?;
        self.set_session(&pair);
        Ok(pair)
    }

    /// Sends a request built by `build` with the current bearer token.
    /// A 401 whose code says the access token expired or failed to verify is
    /// refreshed and retried once; any other 401 is returned as
    /// [`ClientError::Status`].
    pub async fn send<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        retry_after_refresh(
            || {
                let token = self.access_token();
                let mut request = build(&self.http);
                if let Some(token) = &token {
                    request = request.bearer_auth(token);
                }
                async move { classify(request.send().await?, token).await }
            },
            |stale| self.refresh_from(stale),
        )
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self.send(|http| http.get(&url)).await?;
        read_data(response).await
    }

    async fn refresh_from(&self, stale: Option<String>) -> Result<(), ClientError> {
        let _guard = self.refresh_lock.lock().await;
        if self.access_token() != stale {
            debug!("token pair already refreshed by a concurrent request");
            return Ok(());
        }
        let Some(refresh_token) = self.refresh_token() else {
            return Err(ClientError::SessionTerminated);
        };

        let response = self
            .http
            .post(self.url("/api/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "silent refresh failed; session terminated");
            self.clear_session();
            return Err(ClientError::SessionTerminated);
        }

        let pair: TokenPairResponse = read_data(response).await?;
        self.set_session(&pair);
        Ok(())
    }
}

async fn classify(
    response: Response,
    token: Option<String>,
) -> Result<Attempt<Response, Option<String>>, ClientError> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return Ok(Attempt::Done(response));
    }

    let code = response
        .json::<ApiResponse<serde_json::Value>>()
        .await
        .ok()
        .and_then(|body| body.code);
    match code.as_deref() {
        Some(code) if is_refreshable_code(code) => Ok(Attempt::Unauthorized(token)),
        _ => {
            debug!(code = ?code, "401 is not refreshable");
            Err(ClientError::Status(StatusCode::UNAUTHORIZED.as_u16()))
        }
    }
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status(status.as_u16()));
    }
    response
        .json::<ApiResponse<T>>()
        .await?
        .data
        .ok_or_else(|| ClientError::InvalidResponse("missing data".to_string()))
}
