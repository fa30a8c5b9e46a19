//! Error types for the HTTP binding.
//!
//! Protocol outcomes (bad payloads, unknown paths, conflicts) are ordinary
//! responses produced by the dispatcher. [`ApiError`] covers what goes
//! wrong before or around that: malformed HTTP and a missing dispatcher.
//! Bodies are plain text, like every protocol response.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use hatnode_core::error::ServiceError;
use hatnode_core::protocol::ContentFormat;

/// Errors raised by the HTTP layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The dispatcher task is not running.
    #[error(transparent)]
    Unavailable(#[from] ServiceError),

    /// The HTTP method has no protocol counterpart.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// A request header could not be understood.
    #[error("invalid {header} header: {value}")]
    InvalidHeader {
        /// Header name.
        header: &'static str,
        /// The offending value.
        value: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidHeader { .. } => StatusCode::BAD_REQUEST,
        };

        let content_type = [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(ContentFormat::TextPlain.mime()),
        )];
        (status, content_type, self.to_string()).into_response()
    }
}
