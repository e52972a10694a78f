//! Database repository for user management operations.
//!
//! Provides the credential-store operations consumed by the auth flows:
//! lookups by id, email and verification token, plus the two mutations the
//! lifecycle allows (rotate verification fields, mark verified).

use crate::database::models::{CreateUser, User};
use crate::errors::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Creates a new UserRepository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new user row in unverified state.
    ///
    /// The unique index on `email` is the authoritative guard against a
    /// concurrent duplicate registration racing the existence check; a
    /// unique violation here maps to `DuplicateAccount`.
    pub async fn create_user(&self, user: CreateUser) -> ServiceResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token, verification_expiry
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.profile_image_url)
        .bind(&user.subscription_plan)
        .bind(&user.verification_token)
        .bind(user.verification_expiry)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::duplicate_account(&user.email)
            }
            _ => ServiceError::from(e),
        })?;

        Ok(created)
    }

    /// Retrieves a user by their unique identifier.
    pub async fn find_by_id(&self, id: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their email.
    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their pending verification token.
    pub async fn find_by_verification_token(&self, token: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            FROM users
            WHERE verification_token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Checks if an email already exists in the system.
    pub async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Marks a user as verified and clears both verification fields.
    pub async fn set_verified(&self, id: &str) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email_verified = 1,
                verification_token = NULL,
                verification_expiry = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }

    /// Rotates the verification token and expiry for an unverified user.
    pub async fn set_verification_token(
        &self,
        id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET verification_token = ?,
                verification_expiry = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING
                id, name, email, password_hash, profile_image_url,
                subscription_plan, email_verified, verification_token,
                verification_expiry, created_at, updated_at
            "#,
        )
        .bind(token)
        .bind(expiry)
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }
}
