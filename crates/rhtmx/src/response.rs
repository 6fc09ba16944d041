// File: src/response.rs
// Purpose: Response value returned by handlers, middleware and the dispatcher

use axum::body::{Body, Bytes};
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

// -- Shared helpers --

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    if let (Result::Ok(name), Result::Ok(val)) = (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, val);
    }
}

/// Status, headers and a fully buffered body
///
/// ```
/// use rhtmx::Response;
/// use rhtmx::StatusCode;
///
/// let res = Response::html("<h1>Hi</h1>").with_header("x-request-id", "42");
/// assert_eq!(res.status, StatusCode::OK);
/// assert_eq!(res.header("x-request-id"), Some("42"));
/// assert_eq!(res.text_body(), "<h1>Hi</h1>");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Empty 200
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_content_type("text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::ok()
            .with_content_type("text/html; charset=utf-8")
            .with_body(body.into())
    }

    /// Serializes `value` as a JSON body; a value that fails to serialize becomes a 500
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::ok()
                .with_content_type("application/json")
                .with_body(body),
            Err(error) => {
                tracing::error!("failed to serialize JSON response: {}", error);
                Self::internal_error("Internal Server Error")
            }
        }
    }

    pub fn not_found(body: impl Into<String>) -> Self {
        Self::text(body).with_status(StatusCode::NOT_FOUND)
    }

    /// 405 with an `Allow` header such as `GET, POST`
    pub fn method_not_allowed(allow: &str) -> Self {
        let mut res = Self::text("Method Not Allowed").with_status(StatusCode::METHOD_NOT_ALLOWED);
        if let Ok(value) = HeaderValue::from_str(allow) {
            res.headers.insert(ALLOW, value);
        }
        res
    }

    pub fn internal_error(body: impl Into<String>) -> Self {
        Self::text(body).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_header(&mut self.headers, key.as_ref(), value.as_ref());
        self
    }

    fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Same response with the body dropped, for `HEAD`
    pub fn without_body(mut self) -> Self {
        self.body = Bytes::new();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Body as text, lossy
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut res = axum::response::Response::new(Body::from(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
