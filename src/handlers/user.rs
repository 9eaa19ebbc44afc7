use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::AuthError;
use crate::middleware::AuthenticatedUser;
use crate::models::{ApiResponse, ProfileResponse};

/// Current user's profile, including the admin flag.
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<ProfileResponse>>, AuthError> {
    let profile = state
        .users
        .find_by_id(user.id())
        .await?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(ApiResponse::ok(profile.into())))
}
