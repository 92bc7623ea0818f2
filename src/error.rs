//! Error types shared by the record engine, the stores and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::i18n::MessageArg;
use crate::upsert::RecordId;

/// A single constraint a plain or relation value failed to satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("this field is required")]
    Required,

    #[error("ensure this field has no more than {max_length} characters")]
    TooLong { max_length: usize },

    #[error("enter a valid email address")]
    InvalidEmail,

    #[error("enter a valid URL")]
    InvalidUrl,

    #[error("must be a valid boolean")]
    ExpectedBoolean,

    #[error("a valid integer is required")]
    ExpectedInteger,

    #[error("not a valid string")]
    ExpectedText,

    #[error("expected a list of identifiers")]
    ExpectedIdList,

    #[error("invalid pk \"{id}\" - object does not exist")]
    UnknownReference { id: RecordId },

    #[error("a record with this value already exists")]
    Duplicate,
}

impl Violation {
    /// Message code in the `COMMON` event of the message catalog.
    pub fn code(&self) -> &'static str {
        match self {
            Violation::Required => "REQUIRED",
            Violation::TooLong { .. } => "TOO_LONG",
            Violation::InvalidEmail => "INVALID_EMAIL",
            Violation::InvalidUrl => "INVALID_URL",
            Violation::ExpectedBoolean => "EXPECTED_BOOLEAN",
            Violation::ExpectedInteger => "EXPECTED_INTEGER",
            Violation::ExpectedText => "EXPECTED_TEXT",
            Violation::ExpectedIdList => "EXPECTED_ID_LIST",
            Violation::UnknownReference { .. } => "UNKNOWN_REFERENCE",
            Violation::Duplicate => "DUPLICATE",
        }
    }

    /// Format arguments for the catalog template, field name first.
    pub fn args(&self, field: &str) -> Vec<MessageArg> {
        let mut args = vec![MessageArg::from(field)];
        match self {
            Violation::TooLong { max_length } => args.push(MessageArg::from(*max_length)),
            Violation::UnknownReference { id } => args.push(MessageArg::from(*id)),
            _ => {}
        }
        args
    }
}

/// Failures of record creation, update and persistence.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Unknown field for {resource}: {field}")]
    Schema { resource: String, field: String },

    #[error("Invalid value for {field}: {violation}")]
    Validation { field: String, violation: Violation },

    #[error("Record not found: {resource}/{id}")]
    NotFound { resource: String, id: RecordId },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RecordError {
    pub fn validation(field: impl Into<String>, violation: Violation) -> Self {
        RecordError::Validation {
            field: field.into(),
            violation,
        }
    }
}

/// Errors returned to HTTP clients. Messages are already localized.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{detail}")]
    BadRequest {
        detail: String,
        field: Option<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            detail: detail.into(),
            field: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest { detail, field } => (
                StatusCode::BAD_REQUEST,
                match field {
                    Some(field) => json!({ "detail": detail, "field": field }),
                    None => json!({ "detail": detail }),
                },
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, json!({ "detail": detail })),
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, json!({ "detail": detail }))
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_codes_and_args() {
        let violation = Violation::TooLong { max_length: 20 };
        assert_eq!(violation.code(), "TOO_LONG");
        assert_eq!(
            violation.args("postal_code"),
            vec![MessageArg::from("postal_code"), MessageArg::from(20usize)]
        );

        assert_eq!(Violation::Required.args("name"), vec![MessageArg::from("name")]);
    }

    #[test]
    fn test_violation_display() {
        assert_eq!(
            Violation::TooLong { max_length: 20 }.to_string(),
            "ensure this field has no more than 20 characters"
        );
        assert_eq!(
            Violation::UnknownReference { id: 3 }.to_string(),
            "invalid pk \"3\" - object does not exist"
        );
        let err: &dyn std::error::Error = &Violation::Duplicate;
        assert_eq!(err.to_string(), "a record with this value already exists");
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError::validation("email", Violation::InvalidEmail);
        assert_eq!(err.to_string(), "Invalid value for email: enter a valid email address");

        let err = RecordError::NotFound {
            resource: "medical_facility".to_string(),
            id: 7,
        };
        assert_eq!(err.to_string(), "Record not found: medical_facility/7");
    }

    #[test]
    fn test_api_error_status_codes() {
        let response = ApiError::bad_request("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::NotFound("gone".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Unauthorized("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
