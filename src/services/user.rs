//! User directory: the profile and password collaborator of the auth core

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{normalize_email, NewUser, User};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user only when both email and password match.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Returns false when the user does not exist.
    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<bool, StoreError>;
}

pub(crate) async fn hash_password(password: String, cost: u32) -> Result<String, StoreError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| StoreError::Hashing(e.to_string()))?
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

/// Missing hashes (unknown email, social-only account) never verify, but
/// still pay for one bcrypt round so timing does not reveal which case hit.
pub(crate) async fn verify_password(
    password: String,
    hash: Option<String>,
    cost: u32,
) -> Result<bool, StoreError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => bcrypt::verify(password, &hash).unwrap_or(false),
        None => {
            let _ = bcrypt::hash(password, cost);
            false
        }
    })
    .await
    .map_err(|e| StoreError::Hashing(e.to_string()))
}

/// Postgres-backed user directory
pub struct PgUserDirectory {
    db_pool: PgPool,
    cost: u32,
}

impl PgUserDirectory {
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            db_pool,
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let user = self.find_by_email(email).await?;
        let hash = user.as_ref().and_then(|u| u.password_hash.clone());

        if verify_password(password.to_string(), hash, self.cost).await? {
            Ok(user)
        } else {
            Ok(None)
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let password_hash = match new_user.password {
            Some(password) => Some(hash_password(password, self.cost).await?),
            None => None,
        };

        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, email, display_name, password_hash, is_admin, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, FALSE, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(&new_user.email))
        .bind(new_user.display_name.trim())
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(user)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(is_admin)
                .execute(&self.db_pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
