//! Persisted entities and creation DTOs for the user store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered (or pending-verification) user account.
///
/// `verification_token` and `verification_expiry` are set together when a
/// verification email is (re)sent and cleared together when verification
/// succeeds; a verified account always has both fields null.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image_url: String,
    pub subscription_plan: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for inserting a new user row.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image_url: String,
    pub subscription_plan: String,
    pub verification_token: String,
    pub verification_expiry: DateTime<Utc>,
}
