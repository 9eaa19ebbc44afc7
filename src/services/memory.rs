use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::user::{hash_password, verify_password, UserDirectory};
use crate::error::StoreError;
use crate::models::{normalize_email, NewUser, User};

const MIN_COST: u32 = 4;

/// In-process user directory keyed by id. Hashes with the minimum bcrypt
/// cost; not for production data.
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<Uuid, User>>,
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    fn users(&self) -> MutexGuard<'_, HashMap<Uuid, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.users().values().find(|u| u.email == email).cloned()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let user = self.lookup_email(email);
        let hash = user.as_ref().and_then(|u| u.password_hash.clone());

        if verify_password(password.to_string(), hash, MIN_COST).await? {
            Ok(user)
        } else {
            Ok(None)
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        if self.lookup_email(&new_user.email).is_some() {
            return Err(StoreError::Duplicate);
        }
        let password_hash = match new_user.password {
            Some(password) => Some(hash_password(password, MIN_COST).await?),
            None => None,
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(&new_user.email),
            display_name: new_user.display_name.trim().to_string(),
            password_hash,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };

        // Re-check under the lock; hashing above ran without it.
        let mut users = self.users();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lookup_email(email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users().get(&id).cloned())
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<bool, StoreError> {
        match self.users().get_mut(&id) {
            Some(user) => {
                user.is_admin = is_admin;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
