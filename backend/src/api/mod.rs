//! Shared API plumbing: response envelope and error conversion.

pub mod common;
