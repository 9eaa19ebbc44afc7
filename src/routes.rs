//! Route definitions for the DreamVault API

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::{self, admin};

// Session routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/social", post(handlers::social_exchange))
        .route("/api/auth/social/complete", post(handlers::complete_onboarding))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/logout", post(handlers::logout))
}

// User routes
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/users/me", get(handlers::get_me))
}

// Admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users/:id", get(admin::get_user))
        .route("/api/admin/users/:id/admin", put(admin::set_admin))
        .route("/api/admin/users/:id/revoke", post(admin::revoke_sessions))
}

/// Full application router without transport-level layers such as CORS.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(auth_routes())
        .merge(user_routes())
        .merge(admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "DreamVault Auth Server"
}

async fn health_check() -> &'static str {
    "OK"
}
