//! Middleware and extractors for the DreamVault API

pub mod auth;

pub use auth::{AdminUser, AuthenticatedUser, OptionalUser};
