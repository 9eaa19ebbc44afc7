//! Refresh Store: at most one live refresh token per user.
//!
//! Values are SHA-256 digests of the token string. Rotation is a single
//! compare-and-swap so two racing refreshes cannot both win.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

/// Hex-encoded SHA-256 of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn of(token: &str) -> Self {
        Self(hex::encode(Sha256::digest(token.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait RefreshStore: Send + Sync {
    /// Upsert: replaces whatever value the user had.
    async fn put(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get(&self, user_id: Uuid) -> Result<Option<TokenDigest>, StoreError>;

    async fn clear(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Clears the slot only while it still holds `current`. Returns whether
    /// anything was removed.
    async fn clear_if_current(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
    ) -> Result<bool, StoreError>;

    /// Replaces `current` with `next` only if `current` is still the stored
    /// value. Returns whether the swap happened.
    async fn rotate(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
        next: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Postgres-backed store, one row per user in `refresh_tokens`.
pub struct PgRefreshStore {
    db_pool: PgPool,
}

impl PgRefreshStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RefreshStore for PgRefreshStore {
    async fn put(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(digest.as_str())
        .bind(expires_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<TokenDigest>, StoreError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT token_hash FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(hash.map(TokenDigest))
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    async fn clear_if_current(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
                .bind(user_id)
                .bind(current.as_str())
                .execute(&self.db_pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn rotate(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
        next: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $3, expires_at = $4, updated_at = NOW()
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(current.as_str())
        .bind(next.as_str())
        .bind(expires_at)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// In-process store for tests and local runs.
#[derive(Default)]
pub struct MemoryRefreshStore {
    slots: Mutex<HashMap<Uuid, TokenDigest>>,
}

impl MemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, TokenDigest>> {
        // A poisoned map is still structurally valid.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RefreshStore for MemoryRefreshStore {
    async fn put(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.slots().insert(user_id, digest.clone());
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<TokenDigest>, StoreError> {
        Ok(self.slots().get(&user_id).cloned())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.slots().remove(&user_id);
        Ok(())
    }

    async fn clear_if_current(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
    ) -> Result<bool, StoreError> {
        let mut slots = self.slots();
        if slots.get(&user_id) != Some(current) {
            return Ok(false);
        }
        slots.remove(&user_id);
        Ok(true)
    }

    async fn rotate(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
        next: &TokenDigest,
        _expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut slots = self.slots();
        match slots.get_mut(&user_id) {
            Some(stored) if stored == current => {
                *stored = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
