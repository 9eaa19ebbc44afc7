//! Collaborator services consumed by the auth core

mod memory;
mod user;

pub use memory::MemoryUserDirectory;
pub use user::{PgUserDirectory, UserDirectory};
