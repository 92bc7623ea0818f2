//! Internationalization (i18n) module for localized API messages.
//!
//! Error and validation text is never hardcoded in handlers. Every message is
//! resolved by (event, language, code) from a shared registry, then
//! parameterized with positional arguments.
//!
//! # Architecture
//!
//! - `registry`: `MessageRegistry`, the shared event/language/code table
//! - `format`: positional `%s` / `%d` substitution into templates
//! - `catalog`: built-in English and Farsi tables installed at startup
//! - `language`: per-request language negotiation
//!
//! # Example
//!
//! ```rust,ignore
//! use hcore_api::i18n::{catalog, MessageRegistry};
//!
//! let registry = MessageRegistry::new("fa");
//! catalog::install(&registry);
//!
//! let text = registry.resolve_in("en", "FACILITY", "NOT_FOUND", &[12i64.into()])?;
//! ```

pub mod catalog;
mod format;
mod language;
mod registry;

pub use format::{format_message, FormatError, MessageArg};
pub use language::{negotiate, parse_accept_language};
pub use registry::{MessageRegistry, MessageTable, ResolveError};
