//! Core data models for the CSV catalog service.
//!
//! These entities represent the catalog's view of an uploaded file. They
//! map cleanly to database rows via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod file;
