//! Record creation and update on top of a pluggable store.
//!
//! # Architecture
//!
//! - `schema`: statically declared field, relation and slug-source lists
//! - `record`: the record value passed between engine, stores and API
//! - `slug`: slug derivation from ordered source fields
//! - `engine`: `UpsertEngine`, the create/update sequence
//! - `store`: the `RecordStore` trait and the in-process `MemoryStore`
//!
//! # Example
//!
//! ```rust,ignore
//! use hcore_api::upsert::{MemoryStore, UpsertEngine};
//!
//! let engine = UpsertEngine::new(Arc::new(MemoryStore::new()));
//! let record = engine.create(&MEDICAL_FACILITY, proposed).await?;
//! ```

mod engine;
mod record;
mod schema;
mod slug;
mod store;

/// Store-assigned record identifier.
pub type RecordId = i64;

pub use engine::UpsertEngine;
pub use record::Record;
pub use schema::{
    FieldKind, FieldSpec, Fields, OnDelete, RecordSchema, RelationSpec, Relations, SearchField,
};
pub use slug::{derive_slug, slugify};
pub use store::{MemoryStore, RecordStore};
