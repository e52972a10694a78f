//! Outgoing email delivery over async SMTP.
//!
//! `Notifier` is the seam the auth flows depend on; `EmailService` is the
//! production implementation over lettre. Sends run under their own timeout
//! so a slow SMTP relay cannot hold up a registration indefinitely.

use crate::config::EmailConfig;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;
use std::time::Duration;

/// Notification adapter consumed by the auth flows.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends an HTML email to the given recipient.
    async fn send_html(&self, to: &str, subject: &str, html_body: &str) -> ServiceResult<()>;
}

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new EmailService instance
    pub fn new(config: EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::validation(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    fn build_message(&self, to_email: &str, subject: &str, html_body: &str) -> ServiceResult<Message> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::validation(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| ServiceError::validation(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send_html(&self, to: &str, subject: &str, html_body: &str) -> ServiceResult<()> {
        let email = self.build_message(to, subject, html_body)?;

        let send = self.mailer.send(email);
        let timeout = Duration::from_secs(self.config.send_timeout_seconds);

        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::notification_failure(e.to_string())),
            Err(_) => Err(ServiceError::notification_failure(format!(
                "SMTP send timed out after {}s",
                self.config.send_timeout_seconds
            ))),
        }
    }
}

/// Builds the HTML body of a verification email.
///
/// Mirrors the registration email: greeting, clickable link, raw link
/// fallback and the expiry notice.
pub fn build_verification_html(recipient_name: &str, verify_url: &str, ttl_minutes: i64) -> String {
    format!(
        r#"
        <p>Dear {recipient_name},</p>
        <p>Thank you for registering. Please click the link below to verify your email address:</p>
        <a href="{verify_url}">Verify Email</a>
        <p>Or paste this link in your browser:</p>
        <p>{verify_url}</p>
        <p>This link will expire in {ttl_minutes} minutes.</p>
        <p>If you did not register, please ignore this email.</p>
        <p>Best regards,<br/>Resume Builder Team</p>
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_html_contains_link_and_expiry() {
        let html = build_verification_html("Ada", "http://localhost:8080/api/auth/verify-email?token=abc", 15);

        assert!(html.contains("Dear Ada"));
        assert!(html.contains(r#"href="http://localhost:8080/api/auth/verify-email?token=abc""#));
        assert!(html.contains("expire in 15 minutes"));
    }
}
