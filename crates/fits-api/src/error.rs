//! Error types for the HTTP API.
//!
//! [`ApiError`] carries its HTTP status all the way out of a handler. The
//! [`IntoResponse`] implementation writes a one line `text/plain` body and
//! nothing else, so a failed request never sends a partial payload.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use fits_db::DbError;
use fits_plot::PlotError;
use fits_types::ValidationError;

/// Errors that can occur while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The query was invalid.
    #[error("{0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The client asked for a representation this route cannot produce.
    #[error("{0}")]
    NotAcceptable(String),

    /// Only GET and OPTIONS are served.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// The database could not be reached or failed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// A server side invariant was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable(_) | Self::Internal(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::BadRequest(msg) => Self::BadRequest(msg),
            ValidationError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => Self::NotFound(msg),
            DbError::Invalid(msg) => Self::BadRequest(msg),
            DbError::Postgres(e) => Self::Unavailable(e.to_string()),
            DbError::Config(msg) => Self::Unavailable(msg),
        }
    }
}

impl From<PlotError> for ApiError {
    fn from(e: PlotError) -> Self {
        Self::Internal(e.to_string())
    }
}
