//! External collaborator adapters: email delivery and image hosting.

pub mod email_service;
pub mod upload_service;
