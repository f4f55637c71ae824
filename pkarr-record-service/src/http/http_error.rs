//! Server error
use axum::{http::StatusCode, response::IntoResponse};

use crate::service::{PublishError, ResolveError};

pub(crate) type HttpResult<T, E = HttpError> = core::result::Result<T, E>;

#[derive(Debug, Clone)]
pub(crate) struct HttpError {
    status: StatusCode,
    detail: Option<String>,
}

impl HttpError {
    pub fn new(status_code: StatusCode, message: Option<impl ToString>) -> HttpError {
        Self {
            status: status_code,
            detail: message.map(|m| m.to_string()),
        }
    }

    pub fn not_found() -> HttpError {
        Self::new(StatusCode::NOT_FOUND, Some("Not Found"))
    }

    pub fn internal_server() -> HttpError {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("Internal server error"),
        )
    }

    pub fn bad_request(message: impl ToString) -> HttpError {
        Self::new(StatusCode::BAD_REQUEST, Some(message))
    }

    pub fn conflict(message: impl ToString) -> HttpError {
        Self::new(StatusCode::CONFLICT, Some(message))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.detail {
            Some(detail) => (self.status, detail).into_response(),
            _ => (self.status,).into_response(),
        }
    }
}

impl From<PublishError> for HttpError {
    fn from(error: PublishError) -> Self {
        match &error {
            PublishError::Validation(_) => Self::bad_request(error),
            PublishError::StaleSequence { .. } => Self::conflict(error),
            PublishError::Persistence(e) => {
                tracing::error!(?e, "publish failed");
                Self::internal_server()
            }
        }
    }
}

impl From<ResolveError> for HttpError {
    fn from(error: ResolveError) -> Self {
        match &error {
            ResolveError::NotFound => Self::not_found(),
            ResolveError::Persistence(e) => {
                tracing::error!(?e, "resolve failed");
                Self::internal_server()
            }
        }
    }
}
