//! DreamVault Auth Library
//!
//! Token issuance, verification, rotation and credential resolution for the
//! DreamVault backend, plus the client side of the silent-refresh protocol.

pub mod app_state;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use app_state::AppState;
pub use routes::app;
