//! Core business logic for the authentication system.
//!
//! Carries the three flows of the account lifecycle: registration (create a
//! pending account and mail a verification link), email verification
//! (consume the link token) and login (credential check plus session-token
//! issuance).

use crate::api::common::validation_errors_to_field_errors;
use crate::auth::models::*;
use crate::config::Config;
use crate::database::models::{CreateUser, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::services::email_service::{EmailService, Notifier, build_verification_html};
use crate::utils::generate_random_string::generate_random_string;
use crate::utils::jwt::JwtUtils;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Length of the single-use verification token (alphanumeric chars).
const VERIFICATION_TOKEN_LEN: usize = 32;

/// Authentication service for registration, verification and login.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    jwt_utils: JwtUtils,
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService instance with the SMTP-backed notifier.
    pub fn new(pool: &'a SqlitePool) -> ServiceResult<Self> {
        let config = Config::from_env()
            .map_err(|e| ServiceError::validation(format!("Config error: {e}")))?;
        let notifier = Arc::new(EmailService::new(config.email.clone())?);

        Ok(Self::with_notifier(pool, config, notifier))
    }

    /// Create an AuthService with an explicit notifier implementation.
    pub fn with_notifier(
        pool: &'a SqlitePool,
        config: Config,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let jwt_utils = JwtUtils::new(&config.jwt_secret, config.jwt_expires_in_seconds);

        AuthService {
            pool,
            jwt_utils,
            notifier,
            config,
        }
    }

    /// Registers a new account in unverified state and mails the
    /// verification link.
    ///
    /// The profile image has already been uploaded by the HTTP layer; this
    /// flow only stores its URL. A notification failure is surfaced to the
    /// caller but the account record is kept (no rollback).
    pub async fn register(
        &self,
        register_request: RegisterRequest,
        image_url: String,
    ) -> ServiceResult<AuthResponse> {
        Self::check_valid(&register_request)?;

        info!("Register request received for {}", register_request.email);

        let repo = UserRepository::new(self.pool);

        if repo.email_exists(&register_request.email).await? {
            return Err(ServiceError::duplicate_account(&register_request.email));
        }

        let password_hash = hash(&register_request.password, self.config.bcrypt_cost)
            .map_err(|e| ServiceError::validation(format!("Password hashing failed: {e}")))?;

        let verification_token = generate_random_string(VERIFICATION_TOKEN_LEN);
        let verification_expiry =
            Utc::now() + Duration::minutes(self.config.verification_ttl_minutes);

        let user = repo
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                name: register_request.name,
                email: register_request.email,
                password_hash,
                profile_image_url: image_url,
                subscription_plan: "basic".to_string(),
                verification_token: verification_token.clone(),
                verification_expiry,
            })
            .await?;

        self.send_verification_email(&user.name, &user.email, &verification_token)
            .await?;

        info!("User {} registered successfully", user.id);

        Ok(AuthResponse::from(&user))
    }

    /// Consumes a verification token and flips the account to verified.
    ///
    /// Re-submitting an already-consumed token fails with `InvalidToken`
    /// because the stored token is cleared on success.
    pub async fn verify_email(&self, token: &str) -> ServiceResult<AuthResponse> {
        let repo = UserRepository::new(self.pool);

        let user = repo
            .find_by_verification_token(token)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let expiry = user
            .verification_expiry
            .ok_or(ServiceError::InvalidToken)?;

        if Utc::now() > expiry {
            return Err(ServiceError::TokenExpired);
        }

        // Guards the race where the stored token was rotated between lookup
        // and this check.
        if user.verification_token.as_deref() != Some(token) {
            return Err(ServiceError::InvalidToken);
        }

        let user = repo.set_verified(&user.id).await?;

        info!("Email verified for user {}", user.id);

        Ok(AuthResponse::from(&user))
    }

    /// Validates credentials and issues a session token.
    ///
    /// Unknown email and wrong password return distinct error kinds; the
    /// asymmetry preserves the original API contract. An unverified account
    /// gets a fresh verification email before the login is rejected.
    pub async fn login(&self, login_request: LoginRequest) -> ServiceResult<AuthResponse> {
        Self::check_valid(&login_request)?;

        let repo = UserRepository::new(self.pool);

        let user = repo
            .find_by_email(&login_request.email)
            .await?
            .ok_or_else(|| {
                error!("Login failed: email {} not found", login_request.email);
                ServiceError::AccountNotFound
            })?;

        let matches = verify(&login_request.password, &user.password_hash)
            .map_err(|e| ServiceError::validation(format!("Password verification failed: {e}")))?;

        if !matches {
            error!("Login failed for {}: password mismatch", user.email);
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.email_verified {
            self.resend_verification(&repo, &user).await;
            return Err(ServiceError::EmailNotVerified);
        }

        let token = self.jwt_utils.generate_token(&user.id)?;

        info!("User {} logged in", user.id);

        let mut response = AuthResponse::from(&user);
        response.token = Some(token);

        Ok(response)
    }

    /// Rotates the verification token and resends the verification email.
    ///
    /// A send failure here is reported in the logs but does not change the
    /// login outcome, which is already `EmailNotVerified`.
    async fn resend_verification(&self, repo: &UserRepository<'_>, user: &User) {
        let token = generate_random_string(VERIFICATION_TOKEN_LEN);
        let expiry = Utc::now() + Duration::minutes(self.config.verification_ttl_minutes);

        let rotated = match repo.set_verification_token(&user.id, &token, expiry).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to rotate verification token for {}: {}", user.id, e);
                return;
            }
        };

        if let Err(e) = self
            .send_verification_email(&rotated.name, &rotated.email, &token)
            .await
        {
            warn!("Failed to resend verification email to {}: {}", rotated.email, e);
        }
    }

    async fn send_verification_email(
        &self,
        name: &str,
        email: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let link = format!(
            "{}/api/auth/verify-email?token={}",
            self.config.app_base_url, token
        );
        let html = build_verification_html(name, &link, self.config.verification_ttl_minutes);

        self.notifier
            .send_html(email, "Email Verification", &html)
            .await?;

        info!("Verification email sent to {email}");

        Ok(())
    }

    fn check_valid<T: Validate>(request: &T) -> ServiceResult<()> {
        if let Err(validation_errors) = request.validate() {
            let message = validation_errors_to_field_errors(validation_errors)
                .into_iter()
                .map(|field_error| format!("{}: {}", field_error.field, field_error.message))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ServiceError::validation(message));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudinaryConfig, EmailConfig};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;

    /// Notifier that records sends instead of talking to SMTP.
    struct MockNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl MockNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn send_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send_html(&self, to: &str, subject: &str, html_body: &str) -> ServiceResult<()> {
            if self.fail {
                return Err(ServiceError::notification_failure("smtp unreachable"));
            }
            self.sent.lock().unwrap().push((
                to.to_string(),
                subject.to_string(),
                html_body.to_string(),
            ));
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 3,
            jwt_secret: "test-secret-at-least-32-bytes-long".to_string(),
            jwt_expires_in_seconds: 3600,
            server_port: 0,
            app_base_url: "http://localhost:8080".to_string(),
            cors_allowed_origin: "http://localhost:5173".to_string(),
            verification_ttl_minutes: 15,
            bcrypt_cost: 4,
            email: EmailConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 587,
                smtp_username: "user".to_string(),
                smtp_password: "pass".to_string(),
                from_name: "Resume Builder".to_string(),
                from_email: "noreply@example.com".to_string(),
                send_timeout_seconds: 1,
            },
            cloudinary: CloudinaryConfig {
                cloud_name: "demo".to_string(),
                upload_preset: "unsigned".to_string(),
                upload_timeout_seconds: 1,
            },
        }
    }

    async fn test_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "pw123secret".to_string(),
        }
    }

    #[tokio::test]
    async fn register_creates_unverified_account_with_expiring_token() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier.clone());

        let response = service
            .register(register_request("a@x.com"), "http://img/x.png".to_string())
            .await
            .unwrap();

        assert_eq!(response.email, "a@x.com");
        assert!(!response.email_verified);
        assert_eq!(response.subscription_plan, "basic");
        assert!(response.token.is_none());

        let stored = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.email_verified);
        let token = stored.verification_token.expect("token must be set");
        assert_eq!(token.len(), VERIFICATION_TOKEN_LEN);
        let expiry = stored.verification_expiry.expect("expiry must be set");
        assert!(expiry > Utc::now());
        assert_ne!(stored.password_hash, "pw123secret");

        assert_eq!(notifier.send_count(), 1);
    }

    #[tokio::test]
    async fn register_same_email_twice_fails_with_duplicate_account() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();

        let err = service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateAccount { .. }));
    }

    #[tokio::test]
    async fn register_surfaces_notification_failure_but_keeps_account() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::failing());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        let err = service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotificationFailure { .. }));

        let stored = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn verify_email_flips_state_and_clears_token() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();

        let repo = UserRepository::new(&pool);
        let token = repo
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        let response = service.verify_email(&token).await.unwrap();
        assert!(response.email_verified);

        let stored = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(stored.email_verified);
        assert!(stored.verification_token.is_none());
        assert!(stored.verification_expiry.is_none());
    }

    #[tokio::test]
    async fn verify_email_twice_fails_with_invalid_token() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();

        let token = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        service.verify_email(&token).await.unwrap();
        let err = service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn verify_email_with_unknown_token_fails() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        let err = service.verify_email("no-such-token").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn verify_email_past_expiry_fails_with_token_expired() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();

        let repo = UserRepository::new(&pool);
        let user = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        let expired = Utc::now() - Duration::minutes(1);
        repo.set_verification_token(&user.id, "stale-token", expired)
            .await
            .unwrap();

        let err = service.verify_email("stale-token").await.unwrap_err();
        assert!(matches!(err, ServiceError::TokenExpired));
    }

    #[tokio::test]
    async fn login_with_unknown_email_fails_with_account_not_found() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        let err = service
            .login(LoginRequest {
                email: "nobody@x.com".to_string(),
                password: "whatever".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccountNotFound));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails_with_invalid_credentials() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();

        let err = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_before_verification_resends_exactly_one_email() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier.clone());

        service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();
        assert_eq!(notifier.send_count(), 1);

        let old_token = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();

        let err = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "pw123secret".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailNotVerified));
        assert_eq!(notifier.send_count(), 2);

        // The stored token was rotated, so the old link is now dead.
        let stored = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.verification_token.unwrap(), old_token);
    }

    #[tokio::test]
    async fn register_verify_login_end_to_end() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let config = test_config();
        let jwt = JwtUtils::new(&config.jwt_secret, config.jwt_expires_in_seconds);
        let service = AuthService::with_notifier(&pool, config, notifier);

        let registered = service
            .register(register_request("a@x.com"), String::new())
            .await
            .unwrap();
        assert!(!registered.email_verified);

        let token = UserRepository::new(&pool)
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();
        let verified = service.verify_email(&token).await.unwrap();
        assert!(verified.email_verified);

        let logged_in = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "pw123secret".to_string(),
            })
            .await
            .unwrap();

        let session_token = logged_in.token.expect("login must return a token");
        assert_eq!(jwt.extract_user_id(&session_token).unwrap(), registered.id);
    }

    #[tokio::test]
    async fn register_rejects_invalid_input() {
        let pool = test_pool().await;
        let notifier = Arc::new(MockNotifier::new());
        let service = AuthService::with_notifier(&pool, test_config(), notifier);

        let err = service
            .register(
                RegisterRequest {
                    name: String::new(),
                    email: "not-an-email".to_string(),
                    password: "short".to_string(),
                },
                String::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }
}
