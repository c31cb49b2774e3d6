use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("event type cannot be empty")]
    EmptyEventType,
    #[error("{0} cannot contain NUL characters")]
    NulCharacter(&'static str),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("invalid event id: {0}")]
    InvalidEventId(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connect(#[source] tokio_postgres::Error),
    #[error("store ping failed: {0}")]
    Ping(#[source] tokio_postgres::Error),
    #[error("ensure table failed: {0}")]
    EnsureTable(#[source] tokio_postgres::Error),
    #[error("insert event failed: {0}")]
    Insert(#[source] tokio_postgres::Error),
    #[error("select event failed: {0}")]
    Select(#[source] tokio_postgres::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// HTTP-facing error: a status plus the JSON body clients receive.
#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, status_text: &'static str, error: String) -> Self {
        Self {
            status,
            body: ErrorResponse {
                status: status_text,
                error,
            },
        }
    }

    pub fn invalid_request(error: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request.", error.to_string())
    }

    pub fn not_found(error: impl ToString) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found.", error.to_string())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::invalid_request(err)
    }
}

// Store failures share the client-error status of validation failures.
impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::invalid_request(err)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
