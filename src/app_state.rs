//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{
    AuthorizationGate, Clock, CookiePolicy, CredentialResolver, RefreshStore, SessionIssuer,
    SocialProvider, TokenCodec,
};
use crate::config::AuthConfig;
use crate::services::UserDirectory;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session_issuer: Arc<SessionIssuer>,
    pub resolver: Arc<CredentialResolver>,
    pub gate: Arc<AuthorizationGate>,
    pub users: Arc<dyn UserDirectory>,
    pub cookie_policy: CookiePolicy,
}

impl AppState {
    /// Wires the auth core around one codec and one refresh store.
    pub fn new(
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
        refresh_store: Arc<dyn RefreshStore>,
        users: Arc<dyn UserDirectory>,
        social: Arc<dyn SocialProvider>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::with_clock(config, clock));

        Self {
            session_issuer: Arc::new(SessionIssuer::new(
                codec.clone(),
                refresh_store.clone(),
                users.clone(),
                social,
            )),
            resolver: Arc::new(CredentialResolver::new(codec, refresh_store)),
            gate: Arc::new(AuthorizationGate::new(users.clone())),
            users,
            cookie_policy: CookiePolicy::from_config(config),
        }
    }
}

impl FromRef<AppState> for Arc<SessionIssuer> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session_issuer.clone()
    }
}

impl FromRef<AppState> for Arc<CredentialResolver> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.resolver.clone()
    }
}

impl FromRef<AppState> for Arc<AuthorizationGate> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for CookiePolicy {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.cookie_policy.clone()
    }
}
