//! Transport-neutral request and response types.
//!
//! The protocol engine (the HTTP binding in `hatnode-server`, or any other
//! transport) turns its own messages into a [`Request`] and renders the
//! [`Response`] back. Statuses follow CoAP response codes so the resource
//! semantics do not depend on the transport they are served over.

use std::fmt;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Create / action.
    Post,
    /// Replace.
    Put,
    /// Remove.
    Delete,
}

impl Method {
    /// Uppercase method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request addressed to a resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The request method.
    pub method: Method,
    /// Slash-separated resource path, with or without a leading slash.
    pub path: String,
    /// Raw request payload.
    pub payload: Vec<u8>,
    /// Whether the client wants to keep observing the resource.
    pub observe: bool,
    /// Only apply a write if the resource is at this version.
    pub if_match: Option<u64>,
}

impl Request {
    /// A request with no payload.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: Vec::new(),
            observe: false,
            if_match: None,
        }
    }

    /// A plain `GET`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A `PUT` carrying `payload`.
    pub fn put(path: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::new(Method::Put, path)
        }
    }

    /// Ask to register as an observer.
    #[must_use]
    pub const fn observing(mut self) -> Self {
        self.observe = true;
        self
    }

    /// Make a write conditional on `version`.
    #[must_use]
    pub const fn if_match(mut self, version: u64) -> Self {
        self.if_match = Some(version);
        self
    }
}

/// Response status, named after the CoAP response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 2.05: the payload is the resource representation.
    Content,
    /// 2.04: the write was applied.
    Changed,
    /// 4.00: the payload was rejected.
    BadRequest,
    /// 4.04: no resource at the path.
    NotFound,
    /// 4.05: the resource does not support the method.
    MethodNotAllowed,
    /// 4.12: a conditional write lost to a concurrent change.
    PreconditionFailed,
}

impl Status {
    /// The `(class, detail)` pair of the CoAP code.
    pub const fn code(self) -> (u8, u8) {
        match self {
            Self::Content => (2, 5),
            Self::Changed => (2, 4),
            Self::BadRequest => (4, 0),
            Self::NotFound => (4, 4),
            Self::MethodNotAllowed => (4, 5),
            Self::PreconditionFailed => (4, 12),
        }
    }

    const fn reason(self) -> &'static str {
        match self {
            Self::Content => "Content",
            Self::Changed => "Changed",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PreconditionFailed => "Precondition Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (class, detail) = self.code();
        write!(f, "{class}.{detail:02} {}", self.reason())
    }
}

/// Media type of a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    /// `text/plain; charset=utf-8`.
    TextPlain,
    /// `application/link-format`, used by resource discovery.
    LinkFormat,
}

impl ContentFormat {
    /// The MIME type string.
    pub const fn mime(self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain; charset=utf-8",
            Self::LinkFormat => "application/link-format",
        }
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Outcome of the request.
    pub status: Status,
    /// Human-readable payload.
    pub payload: String,
    /// Media type of `payload`.
    pub content_format: ContentFormat,
    /// Version of the resource the payload reflects, for stateful resources.
    pub version: Option<u64>,
}

impl Response {
    /// A plain-text response.
    pub fn text(status: Status, payload: impl Into<String>) -> Self {
        Self {
            status,
            payload: payload.into(),
            content_format: ContentFormat::TextPlain,
            version: None,
        }
    }

    /// A link-format discovery response.
    pub fn links(payload: impl Into<String>) -> Self {
        Self {
            content_format: ContentFormat::LinkFormat,
            ..Self::text(Status::Content, payload)
        }
    }

    /// Attach the resource version.
    #[must_use]
    pub const fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}
