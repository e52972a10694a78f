//! Global application error types and handlers.
//!
//! This module defines custom error types that are used across the entire
//! backend application and provides mechanisms for consistent error handling
//! and response formatting.

use thiserror::Error;

/// Domain errors for the registration, verification and login flows.
///
/// Each variant is a distinguishable error kind: callers branch on the kind
/// rather than catching generic failures. Messages never carry password
/// hashes, signing secrets or raw tokens.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("User with email {email} already exists")]
    DuplicateAccount { email: String },

    #[error("Invalid verification token")]
    InvalidToken,

    #[error("Verification token has expired, please request a new one")]
    TokenExpired,

    #[error("Email not found")]
    AccountNotFound,

    #[error("Wrong password, please try again")]
    InvalidCredentials,

    #[error("Email is not verified, a new verification email has been sent")]
    EmailNotVerified,

    #[error("Failed to send notification email: {message}")]
    NotificationFailure { message: String },

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Credential store unavailable: {source}")]
    StoreUnavailable {
        #[from]
        source: anyhow::Error,
    },

    #[error("External service error: {message}")]
    ExternalService { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn duplicate_account(email: impl Into<String>) -> Self {
        Self::DuplicateAccount {
            email: email.into(),
        }
    }

    pub fn notification_failure(message: impl Into<String>) -> Self {
        Self::NotificationFailure {
            message: message.into(),
        }
    }

    pub fn external_service(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::StoreUnavailable {
            source: anyhow::Error::new(error),
        }
    }
}
