//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database URL, server port, JWT signing secret, SMTP credentials and
//! the Cloudinary upload target.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expires_in_seconds: u64,
    pub server_port: u16,
    pub app_base_url: String,
    pub cors_allowed_origin: String,
    pub verification_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub email: EmailConfig,
    pub cloudinary: CloudinaryConfig,
}

/// SMTP transport settings for outgoing verification mail.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_name: String,
    pub from_email: String,
    pub send_timeout_seconds: u64,
}

/// Cloudinary unsigned-upload settings for profile images.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    pub upload_timeout_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECONDS must be a valid number")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET not set")?;

        let jwt_expires_in_seconds = env::var("JWT_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse::<u64>()
            .context("JWT_EXPIRES_IN_SECONDS must be a valid number")?;

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid number")?;

        let app_base_url =
            env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let cors_allowed_origin =
            env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let verification_ttl_minutes = env::var("VERIFICATION_TTL_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<i64>()
            .context("VERIFICATION_TTL_MINUTES must be a valid number")?;

        let bcrypt_cost = env::var("BCRYPT_COST")
            .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
            .parse::<u32>()
            .context("BCRYPT_COST must be a valid number")?;

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            jwt_expires_in_seconds,
            server_port,
            app_base_url,
            cors_allowed_origin,
            verification_ttl_minutes,
            bcrypt_cost,
            email: EmailConfig::from_env()?,
            cloudinary: CloudinaryConfig::from_env()?,
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self> {
        let smtp_host = env::var("SMTP_HOST").context("SMTP_HOST not set")?;

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .context("SMTP_PORT must be a valid number")?;

        let smtp_username = env::var("SMTP_USERNAME").context("SMTP_USERNAME not set")?;
        let smtp_password = env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?;

        let from_name = env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Resume Builder".to_string());
        let from_email = env::var("MAIL_FROM_EMAIL").context("MAIL_FROM_EMAIL not set")?;

        let send_timeout_seconds = env::var("MAIL_SEND_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("MAIL_SEND_TIMEOUT_SECONDS must be a valid number")?;

        Ok(EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_name,
            from_email,
            send_timeout_seconds,
        })
    }
}

impl CloudinaryConfig {
    fn from_env() -> Result<Self> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME").context("CLOUDINARY_CLOUD_NAME not set")?;
        let upload_preset =
            env::var("CLOUDINARY_UPLOAD_PRESET").context("CLOUDINARY_UPLOAD_PRESET not set")?;

        let upload_timeout_seconds = env::var("CLOUDINARY_UPLOAD_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("CLOUDINARY_UPLOAD_TIMEOUT_SECONDS must be a valid number")?;

        Ok(CloudinaryConfig {
            cloud_name,
            upload_preset,
            upload_timeout_seconds,
        })
    }
}
