//! Hospital-management backend: medical facility records over REST with
//! localized error messages.
//!
//! - `upsert`: record creation and update (slug derivation, relation replacement)
//! - `i18n`: event/language/code message registry and the built-in catalog
//! - `facilities`: facility schemas and their list behavior
//! - `api`: axum router and handlers
//! - `db`: PostgreSQL record store

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod facilities;
pub mod i18n;
pub mod query;
pub mod security;
pub mod upsert;
