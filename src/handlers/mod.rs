//! API handlers for the DreamVault auth server

pub mod admin;
pub mod auth;
pub mod user;

pub use auth::{complete_onboarding, login, logout, refresh, signup, social_exchange};
pub use user::get_me;
