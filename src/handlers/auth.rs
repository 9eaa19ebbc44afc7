//! Session endpoints: login, signup, social exchange, refresh, logout

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::app_state::AppState;
use crate::auth::{SocialOutcome, REFRESH_COOKIE};
use crate::error::AuthError;
use crate::middleware::OptionalUser;
use crate::models::{
    ApiResponse, CompleteOnboardingRequest, LoginRequest, RefreshRequest, SignupRequest,
    SocialExchangeRequest, SocialExchangeResponse, TokenPairResponse,
};

type SessionReply = (CookieJar, Json<ApiResponse<TokenPairResponse>>);

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<SessionReply, AuthError> {
    let session = state
        .session_issuer
        .login(&request.email, &request.password)
        .await?;

    let jar = state.cookie_policy.attach(jar, &session);
    Ok((jar, Json(ApiResponse::ok(session.into()))))
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<SignupRequest>,
) -> Result<SessionReply, AuthError> {
    let session = state.session_issuer.signup(request).await?;

    let jar = state.cookie_policy.attach(jar, &session);
    Ok((jar, Json(ApiResponse::ok(session.into()))))
}

pub async fn social_exchange(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<SocialExchangeRequest>,
) -> Result<(CookieJar, Json<ApiResponse<SocialExchangeResponse>>), AuthError> {
    match state
        .session_issuer
        .social_exchange(&request.provider_token)
        .await?
    {
        SocialOutcome::Session(session) => {
            let jar = state.cookie_policy.attach(jar, &session);
            Ok((
                jar,
                Json(ApiResponse::ok(SocialExchangeResponse {
                    needs_onboarding: false,
                    session: Some(session.into()),
                    email: None,
                    display_name: None,
                })),
            ))
        }
        SocialOutcome::OnboardingRequired(prefill) => Ok((
            jar,
            Json(ApiResponse::ok(SocialExchangeResponse {
                needs_onboarding: true,
                session: None,
                email: Some(prefill.email),
                display_name: prefill.display_name,
            })),
        )),
    }
}

pub async fn complete_onboarding(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CompleteOnboardingRequest>,
) -> Result<SessionReply, AuthError> {
    let session = state.session_issuer.complete_onboarding(request).await?;

    let jar = state.cookie_policy.attach(jar, &session);
    Ok((jar, Json(ApiResponse::ok(session.into()))))
}

/// Browser clients send the cookie; mobile clients may send the token in the
/// body instead.
fn presented_refresh_token(jar: &CookieJar, body: Option<Json<RefreshRequest>>) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|t| !t.is_empty())
}

/// A rejected refresh token also clears the session cookies. Server-side
/// failures leave them alone so the session survives an outage.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<SessionReply, (CookieJar, AuthError)> {
    let Some(presented) = presented_refresh_token(&jar, body) else {
        return Err((jar, AuthError::Unauthenticated));
    };

    match state.session_issuer.refresh(&presented).await {
        Ok(session) => {
            let jar = state.cookie_policy.attach(jar, &session);
            Ok((jar, Json(ApiResponse::ok(session.into()))))
        }
        Err(AuthError::InvalidRefreshToken) => Err((
            state.cookie_policy.clear(jar),
            AuthError::InvalidRefreshToken,
        )),
        Err(e) => Err((jar, e)),
    }
}

/// Best effort: always succeeds for the caller and always clears cookies.
/// Without a live access token the presented refresh token identifies the
/// session to end.
pub async fn logout(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> (CookieJar, Json<ApiResponse<()>>) {
    let outcome = match (user, presented_refresh_token(&jar, body)) {
        (Some(user), _) => state.session_issuer.logout(user.user_id).await,
        (None, Some(presented)) => state.session_issuer.logout_with_refresh(&presented).await,
        (None, None) => Ok(()),
    };
    if let Err(e) = outcome {
        warn!(error = %e, "logout could not clear refresh token");
    }

    (state.cookie_policy.clear(jar), Json(ApiResponse::ok(())))
}
