// File: src/request_context.rs
// Purpose: Request view handed to middleware, handlers and loaders

use crate::body::{method_has_body, BodyReader};
use crate::revalidate::Revalidator;
use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use rhtmx_router::Params;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Request context passed to middleware, API handlers and page loaders
///
/// Route parameters are filled in by the dispatcher after matching; the
/// body reader is present only for methods that carry a body.
#[derive(Clone)]
pub struct RequestContext {
    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: Method,

    /// Request path, without the query string
    pub path: String,

    /// Query parameters from URL (?key=value)
    pub query: QueryParams,

    /// Request headers
    pub headers: HeaderMap,

    /// Parsed cookies
    pub cookies: HashMap<String, String>,

    /// Parameters bound by the matched route
    pub params: Params,

    /// Values attached by middleware for later stages (e.g. the signed-in user)
    pub locals: Map<String, JsonValue>,

    body: Option<BodyReader>,
    raw_query: Option<String>,
    revalidator: Option<Revalidator>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}

impl RequestContext {
    /// Create a new request context
    pub fn new(
        method: Method,
        path: impl Into<String>,
        raw_query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let cookies = Self::parse_cookies(&headers);
        let raw_query = raw_query.filter(|q| !q.is_empty()).map(str::to_string);
        let query = raw_query
            .as_deref()
            .map(QueryParams::parse)
            .unwrap_or_default();

        let body = method_has_body(&method).then(|| {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            BodyReader::new(body, content_type)
        });

        Self {
            method,
            path: path.into(),
            query,
            headers,
            cookies,
            params: Params::new(),
            locals: Map::new(),
            body,
            raw_query,
            revalidator: None,
        }
    }

    /// Bodiless request, mostly for tests and internal dispatch
    pub fn get(path: &str) -> Self {
        Self::from_uri(Method::GET, path)
    }

    /// Builds a request from a path that may carry a query string
    pub fn from_uri(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };
        Self::new(method, path, query, HeaderMap::new(), Bytes::new())
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self.cookies = Self::parse_cookies(&self.headers);
        self
    }

    /// Replaces the body; ignored for methods without one
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        if method_has_body(&self.method) {
            self.body = Some(BodyReader::new(body, Some(content_type.to_string())));
        }
        self
    }

    /// Parse cookies from Cookie header
    fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
        let mut cookies = HashMap::new();

        if let Some(cookie_header) = headers.get("cookie") {
            if let Ok(cookie_str) = cookie_header.to_str() {
                for cookie in cookie_str.split(';') {
                    let cookie = cookie.trim();
                    if let Some((key, value)) = cookie.split_once('=') {
                        cookies.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        cookies
    }

    /// Path plus query string, as used for page data cache keys
    ///
    /// A single trailing slash is dropped so `/blog/` and `/blog` share data,
    /// and path segments are re-encoded canonically so `/a%20b` and `/a b` do too.
    pub fn url(&self) -> String {
        let path = canonical_path(&self.path);
        match &self.raw_query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        }
    }

    /// Typed body access; `None` for GET, HEAD and other bodiless methods
    pub fn body(&self) -> Option<&BodyReader> {
        self.body.as_ref()
    }

    /// Route parameter bound by a dynamic segment
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get_str(name)
    }

    /// Route parameters bound by a catch-all segment
    pub fn segments(&self, name: &str) -> Option<&[String]> {
        self.params.get_segments(name)
    }

    /// Handle for invalidating cached page data after a mutation
    ///
    /// Attached by the dispatcher to every matched request.
    pub fn revalidator(&self) -> Option<&Revalidator> {
        self.revalidator.as_ref()
    }

    pub(crate) fn set_revalidator(&mut self, revalidator: Revalidator) {
        self.revalidator = Some(revalidator);
    }

    /// Get a cookie value
    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    /// Get a header value
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Check if request accepts JSON
    pub fn accepts_json(&self) -> bool {
        self.get_header("accept")
            .is_some_and(|accept| accept.contains("json"))
    }

    /// Check if this is an HTMX request
    pub fn is_htmx(&self) -> bool {
        self.get_header("hx-request").is_some()
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// Drops one trailing slash, except on the root path
pub(crate) fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

/// Normalized path with every segment percent-decoded, then re-encoded
///
/// Encoded and decoded spellings of one path map to the same string. An
/// encoded `/` stays inside its segment.
pub(crate) fn canonical_path(path: &str) -> String {
    normalize_path(path)
        .split('/')
        .map(|segment| match urlencoding::decode(segment) {
            Ok(decoded) => urlencoding::encode(&decoded).into_owned(),
            Err(_) => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Query parameters from URL
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: HashMap<String, String>,
}

impl QueryParams {
    /// Create from HashMap
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    /// Parse a raw query string; later duplicates win
    pub fn parse(raw: &str) -> Self {
        let params = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_lossy(key), decode_lossy(value))
            })
            .collect();
        Self { params }
    }

    /// Get a query parameter value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }

    /// Get a query parameter as a specific type
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key)?.parse().ok()
    }

    /// Check if a parameter exists
    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Get as HashMap
    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.params
    }
}

fn decode_lossy(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
