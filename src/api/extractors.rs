//! Request extractors: message language and write authorization.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::{ApiError, RecordError};
use crate::facilities::Resource;
use crate::i18n::{catalog::COMMON, negotiate, MessageArg, MessageRegistry, ResolveError};
use crate::security::is_write_authorized;

#[derive(Debug, Deserialize)]
struct LangParam {
    lang: Option<String>,
}

/// Resolves messages in the language negotiated for the current request.
#[derive(Clone)]
pub struct Localizer {
    registry: Arc<MessageRegistry>,
    language: String,
}

impl Localizer {
    pub fn new(registry: Arc<MessageRegistry>, language: impl Into<String>) -> Self {
        Self {
            registry,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve a message. A missing entry is a client-visible 400; a
    /// template that does not fit its arguments is an internal fault.
    pub fn text(&self, event: &str, code: &str, args: &[MessageArg]) -> Result<String, ApiError> {
        self.registry
            .resolve_in(&self.language, event, code, args)
            .map_err(|err| match err {
                ResolveError::MessageNotFound { .. } => ApiError::bad_request(err.to_string()),
                ResolveError::Format { .. } => ApiError::Internal(err.into()),
            })
    }

    pub fn bad_request(&self, code: &str, args: &[MessageArg], field: Option<&str>) -> ApiError {
        match self.text(COMMON, code, args) {
            Ok(detail) => ApiError::BadRequest {
                detail,
                field: field.map(str::to_string),
            },
            Err(err) => err,
        }
    }

    pub fn not_found(&self, event: &str, args: &[MessageArg]) -> ApiError {
        match self.text(event, "NOT_FOUND", args) {
            Ok(detail) => ApiError::NotFound(detail),
            Err(err) => err,
        }
    }

    /// Not-found without a resource-specific message, e.g. an unknown URL segment.
    pub fn not_found_generic(&self) -> ApiError {
        self.not_found(COMMON, &[])
    }

    /// Requested page number is malformed or past the last page.
    pub fn invalid_page(&self) -> ApiError {
        match self.text(COMMON, "INVALID_PAGE", &[]) {
            Ok(detail) => ApiError::NotFound(detail),
            Err(err) => err,
        }
    }

    pub fn unauthorized(&self) -> ApiError {
        match self.text(COMMON, "UNAUTHORIZED", &[]) {
            Ok(detail) => ApiError::Unauthorized(detail),
            Err(err) => err,
        }
    }

    /// Negotiate the language for a request from `?lang=` and `Accept-Language`.
    pub fn for_request(parts: &Parts, state: &AppState) -> Self {
        let requested = Query::<LangParam>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(param)| param.lang);
        let accept_language = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());

        let language = negotiate(&state.registry, requested.as_deref(), accept_language);
        Self::new(Arc::clone(&state.registry), language)
    }

    /// Map an engine or store failure to a localized response.
    pub fn record_error(&self, resource: &Resource, err: RecordError) -> ApiError {
        match err {
            RecordError::Schema { field, .. } => {
                self.bad_request("UNKNOWN_FIELD", &[field.as_str().into()], Some(field.as_str()))
            }
            RecordError::Validation { field, violation } => {
                self.bad_request(violation.code(), &violation.args(&field), Some(field.as_str()))
            }
            RecordError::NotFound { id, .. } => self.not_found(resource.event, &[id.into()]),
            RecordError::Database(err) => ApiError::Internal(err.into()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Localizer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self::for_request(parts, state))
    }
}

/// Proof that the request may modify records.
pub struct WriteAccess;

#[async_trait]
impl FromRequestParts<AppState> for WriteAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_write_authorized(&state.config, &parts.headers) {
            return Ok(WriteAccess);
        }

        tracing::warn!(method = %parts.method, uri = %parts.uri, "Rejected unauthenticated write");
        Err(Localizer::for_request(parts, state).unauthorized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use crate::facilities::find_resource;
    use crate::i18n::catalog;

    fn localizer(language: &str) -> Localizer {
        let registry = MessageRegistry::new("fa");
        catalog::install(&registry);
        Localizer::new(Arc::new(registry), language)
    }

    fn facility() -> &'static Resource {
        find_resource("medical_facility").unwrap()
    }

    #[test]
    fn test_validation_error_is_localized_with_field() {
        let err = localizer("en").record_error(
            facility(),
            RecordError::validation("postal_code", Violation::TooLong { max_length: 20 }),
        );

        match err {
            ApiError::BadRequest { detail, field } => {
                assert_eq!(detail, "postal_code: ensure this field has no more than 20 characters.");
                assert_eq!(field.as_deref(), Some("postal_code"));
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_uses_resource_event() {
        let err = localizer("fa").record_error(
            facility(),
            RecordError::NotFound {
                resource: "medical_facility".to_string(),
                id: 4,
            },
        );
        assert!(matches!(err, ApiError::NotFound(detail) if detail == "مرکز درمانی 4 یافت نشد."));
    }

    #[test]
    fn test_missing_message_is_bad_request() {
        let err = localizer("en").not_found("PATIENT", &[1i64.into()]);
        assert!(matches!(
            err,
            ApiError::BadRequest { detail, .. } if detail == "PATIENT this Error Event Not Found."
        ));
    }

    #[test]
    fn test_unknown_field_names_field() {
        let err = localizer("en").record_error(
            facility(),
            RecordError::Schema {
                resource: "medical_facility".to_string(),
                field: "beds".to_string(),
            },
        );
        assert!(matches!(
            err,
            ApiError::BadRequest { detail, field } if detail == "Unknown field: beds" && field.as_deref() == Some("beds")
        ));
    }
}
