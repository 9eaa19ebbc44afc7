//! Error taxonomy for the auth core and its HTTP surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::jwt::TokenError;
use crate::models::ApiResponse;

/// Persistence failures from the Refresh Store and the user directory.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Invalid provider token")]
    InvalidProviderToken,

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::DuplicateAccount => "duplicate_account",
            Self::InvalidProviderToken => "invalid_provider_token",
            Self::Forbidden => "forbidden",
            Self::Validation(_) => "validation_error",
            Self::NotFound => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::InvalidRefreshToken
            | Self::InvalidProviderToken => StatusCode::UNAUTHORIZED,
            Self::DuplicateAccount | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a client should attempt one silent refresh before giving up.
    pub fn is_refreshable(&self) -> bool {
        is_refreshable_code(self.code())
    }
}

/// Same classification as [`AuthError::is_refreshable`], keyed by the wire code.
pub fn is_refreshable_code(code: &str) -> bool {
    matches!(code, "expired_token" | "invalid_token")
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::Encoding => Self::Internal(e.to_string()),
            TokenError::Malformed | TokenError::InvalidSignature | TokenError::WrongKind { .. } => {
                Self::InvalidToken
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => Self::DuplicateAccount,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "auth internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body: ApiResponse<()> = ApiResponse::failure(message, self.code());
        (status, Json(body)).into_response()
    }
}
