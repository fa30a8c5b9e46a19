//! Error types for the resource layer.
//!
//! [`ResourceError`] covers everything a client can provoke and converts
//! into a protocol [`Response`] with a status and a readable payload.
//! [`ObserverError`] is internal to notification delivery and never reaches
//! a client. [`ServiceError`] is what the transport sees when the dispatcher
//! task is gone.

use crate::protocol::{Method, Response, Status};
use crate::state::ResourceId;

/// Errors a request against a resource can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The payload is not an accepted value for the resource.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The resource does not support the request method.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// The rejected method.
        method: Method,
        /// The requested path.
        path: String,
    },

    /// No resource lives at the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write expected a version the resource is no longer at.
    #[error("precondition failed: expected version {expected}, current {current}")]
    PreconditionFailed {
        /// Version the client expected.
        expected: u64,
        /// Version the resource is at.
        current: u64,
    },
}

impl ResourceError {
    /// The protocol status this error maps to.
    pub const fn status(&self) -> Status {
        match self {
            Self::InvalidPayload(_) => Status::BadRequest,
            Self::MethodNotAllowed { .. } => Status::MethodNotAllowed,
            Self::NotFound(_) => Status::NotFound,
            Self::PreconditionFailed { .. } => Status::PreconditionFailed,
        }
    }
}

impl From<ResourceError> for Response {
    fn from(error: ResourceError) -> Self {
        let payload = match &error {
            ResourceError::InvalidPayload(reason) => reason.clone(),
            other => other.to_string(),
        };
        let response = Self::text(error.status(), payload);
        match error {
            ResourceError::PreconditionFailed { current, .. } => response.with_version(current),
            _ => response,
        }
    }
}

/// Errors delivering a notification to a single observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    /// The observer's receiving side is gone.
    #[error("delivery to observer {observer} on {resource} failed: receiver dropped")]
    DeliveryFailed {
        /// The resource being observed.
        resource: ResourceId,
        /// The observer's id.
        observer: u64,
    },
}

/// Errors talking to the dispatcher task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The dispatcher task has exited.
    #[error("dispatcher is not running")]
    Unavailable,
}
