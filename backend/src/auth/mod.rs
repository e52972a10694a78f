//! Authentication module for account registration, verification and login.
//!
//! This module provides the public interface for user authentication:
//! registration with email verification, login with session-token issuance,
//! and the bearer-token middleware protecting the rest of the API.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
