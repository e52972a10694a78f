//! Data-access layer: one repository per persisted entity.

pub mod user_repository;
