//! Request handlers bridging HTTP and the resource protocol.
//!
//! | HTTP | Protocol |
//! |------|----------|
//! | method | `GET` / `POST` / `PUT` / `DELETE` |
//! | path | resource path |
//! | body | payload bytes |
//! | `If-Match` | expected version for a conditional `PUT` |
//! | status | `2.05`/`2.04` -> 200, `4.00` -> 400, `4.04` -> 404, `4.05` -> 405, `4.12` -> 412 |
//! | `ETag` | resource version |
//! | `Content-Type` | `text/plain` or `application/link-format` |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use hatnode_core::protocol::{self, Method, Status};

use crate::error::ApiError;
use crate::state::AppState;

/// Route any request to the dispatcher.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: axum::http::Method,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut request = protocol::Request::new(protocol_method(&method)?, uri.path());
    request.payload = body.to_vec();
    request.if_match = if_match(&headers)?;

    let reply = state.dispatcher().call(request).await?;
    Ok(into_http(reply.response))
}

fn protocol_method(method: &axum::http::Method) -> Result<Method, ApiError> {
    match *method {
        axum::http::Method::GET => Ok(Method::Get),
        axum::http::Method::POST => Ok(Method::Post),
        axum::http::Method::PUT => Ok(Method::Put),
        axum::http::Method::DELETE => Ok(Method::Delete),
        _ => Err(ApiError::UnsupportedMethod(method.to_string())),
    }
}

/// Parse `If-Match` as a version number, quoted or bare.
pub fn if_match(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let invalid = || ApiError::InvalidHeader {
        header: "If-Match",
        value: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
    };
    let text = raw.to_str().map_err(|_opaque| invalid())?.trim();
    let unquoted = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    unquoted.parse().map(Some).map_err(|_not_a_number| invalid())
}

/// The HTTP status a protocol status maps to.
pub const fn http_status(status: Status) -> StatusCode {
    match status {
        Status::Content | Status::Changed => StatusCode::OK,
        Status::BadRequest => StatusCode::BAD_REQUEST,
        Status::NotFound => StatusCode::NOT_FOUND,
        Status::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        Status::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
    }
}

/// Render a protocol response as HTTP.
pub fn into_http(response: protocol::Response) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(response.content_format.mime()),
    );
    if let Some(version) = response.version {
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{version}\"")) {
            headers.insert(header::ETAG, etag);
        }
    }
    (http_status(response.status), headers, response.payload).into_response()
}
