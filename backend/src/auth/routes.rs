//! Defines the HTTP routes for authentication.
//!
//! The four unauthenticated endpoints (register, verify-email, login,
//! upload-image) plus the token-protected `/me` endpoint, designed to be
//! nested under `/api/auth` in the main Axum router.

use crate::auth::handlers::*;
use crate::auth::middleware::*;
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", get(verify_email))
        .route("/login", post(login))
        .route("/upload-image", post(upload_image))
        .route("/me", get(me).layer(middleware::from_fn(jwt_auth)))
}
