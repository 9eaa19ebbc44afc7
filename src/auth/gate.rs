use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::error::AuthError;
use crate::services::UserDirectory;

/// Admin privilege check. Reads the directory on every call; privilege is
/// never carried in tokens, so a revoked flag applies immediately.
pub struct AuthorizationGate {
    users: Arc<dyn UserDirectory>,
}

impl AuthorizationGate {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn is_admin(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let user = self.users.find_by_id(user_id).await?;
        Ok(user.is_some_and(|u| u.is_admin))
    }

    pub async fn require_admin(&self, user_id: Uuid) -> Result<(), AuthError> {
        if self.is_admin(user_id).await? {
            Ok(())
        } else {
            warn!(user_id = %user_id, "admin access denied");
            Err(AuthError::Forbidden)
        }
    }
}
