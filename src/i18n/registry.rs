//! Message registry: localized, parameterized text keyed by event, language and code.
//!
//! One registry is built at process start, filled from the built-in catalog
//! and shared behind an `Arc`. Readers take a read lock for the duration of a
//! single lookup; `register` and `extend` take the write lock, so a reader
//! sees either the old or the new table, never a partial merge.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

use crate::i18n::format::{format_message, FormatError, MessageArg};

/// code -> template
pub type MessageTable = HashMap<String, String>;

/// event -> language -> table
type Tables = HashMap<String, HashMap<String, MessageTable>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No template at (event, language, code). Which level was missing is not reported.
    #[error("{event} this Error Event Not Found.")]
    MessageNotFound { event: String },

    #[error("Failed to format message {event}/{code}: {source}")]
    Format {
        event: String,
        code: String,
        #[source]
        source: FormatError,
    },
}

pub struct MessageRegistry {
    default_language: String,
    tables: RwLock<Tables>,
}

impl MessageRegistry {
    /// Empty registry resolving in `default_language` unless told otherwise.
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            tables: RwLock::new(Tables::new()),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole table for (event, language).
    pub fn register<I, K, V>(&self, event: &str, language: &str, table: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table: MessageTable = table
            .into_iter()
            .map(|(code, template)| (code.into(), template.into()))
            .collect();
        debug!(event, language, codes = table.len(), "Registering message table");

        self.write()
            .entry(event.to_string())
            .or_default()
            .insert(language.to_string(), table);
    }

    /// Merge entries into the table for (event, language), creating it if absent.
    ///
    /// Existing codes not present in `partial` are kept; codes present in both
    /// take the new template.
    pub fn extend<I, K, V>(&self, event: &str, language: &str, partial: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let partial: Vec<(String, String)> = partial
            .into_iter()
            .map(|(code, template)| (code.into(), template.into()))
            .collect();
        debug!(event, language, codes = partial.len(), "Extending message table");

        self.write()
            .entry(event.to_string())
            .or_default()
            .entry(language.to_string())
            .or_default()
            .extend(partial);
    }

    /// Snapshot of the table for (event, language).
    pub fn table(&self, event: &str, language: &str) -> Option<MessageTable> {
        self.read()
            .get(event)
            .and_then(|languages| languages.get(language))
            .cloned()
    }

    /// Whether any event has a table in `language`.
    pub fn has_language(&self, language: &str) -> bool {
        self.read()
            .values()
            .any(|languages| languages.contains_key(language))
    }

    /// Resolve `code` under `event` in the default language.
    pub fn resolve(&self, event: &str, code: &str, args: &[MessageArg]) -> Result<String, ResolveError> {
        self.resolve_in(&self.default_language, event, code, args)
    }

    /// Resolve `code` under `event` in `language`.
    ///
    /// With no `args` the template is returned verbatim. Otherwise every
    /// placeholder must match one argument.
    ///
    /// # Errors
    /// * `MessageNotFound` - unknown event, language or code
    /// * `Format` - the arguments do not fit the template
    pub fn resolve_in(
        &self,
        language: &str,
        event: &str,
        code: &str,
        args: &[MessageArg],
    ) -> Result<String, ResolveError> {
        let template = self
            .read()
            .get(event)
            .and_then(|languages| languages.get(language))
            .and_then(|table| table.get(code))
            .cloned()
            .ok_or_else(|| ResolveError::MessageNotFound {
                event: event.to_string(),
            })?;

        if args.is_empty() {
            return Ok(template);
        }

        format_message(&template, args).map_err(|source| ResolveError::Format {
            event: event.to_string(),
            code: code.to_string(),
            source,
        })
    }
}
