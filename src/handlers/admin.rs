//! Privileged endpoints. Every handler takes [`AdminUser`], so the admin flag
//! is re-read from the directory on each request.

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::AuthError;
use crate::middleware::AdminUser;
use crate::models::{ApiResponse, ProfileResponse, SetAdminRequest};

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProfileResponse>>, AuthError> {
    let profile = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(ApiResponse::ok(profile.into())))
}

pub async fn set_admin(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetAdminRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, AuthError> {
    if !state.users.set_admin(id, request.is_admin).await? {
        return Err(AuthError::NotFound);
    }
    info!(admin_id = %admin.id(), user_id = %id, is_admin = request.is_admin, "admin flag changed");

    let profile = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(Json(ApiResponse::ok(profile.into())))
}

/// Forced revocation: clears the user's refresh token.
pub async fn revoke_sessions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.session_issuer.revoke(id).await?;
    info!(admin_id = %admin.id(), user_id = %id, "sessions revoked by admin");

    Ok(Json(ApiResponse::ok(())))
}
