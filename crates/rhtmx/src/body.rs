// File: src/body.rs
// Purpose: Typed access to request bodies for methods that carry one

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::http::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Methods whose requests get a [`BodyReader`]
pub fn method_has_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Buffered request body plus its declared content type
#[derive(Debug, Clone, Default)]
pub struct BodyReader {
    bytes: Bytes,
    content_type: Option<String>,
}

impl BodyReader {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.contains("application/json"))
    }

    pub fn is_form(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/x-www-form-urlencoded"))
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).context("request body is not valid UTF-8")
    }

    /// Deserialize a JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes).context("request body is not valid JSON")
    }

    /// Decode a urlencoded form body; values are trimmed
    pub fn form(&self) -> Result<HashMap<String, String>> {
        let text = self.text()?;
        text.split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| -> Result<(String, String)> {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                Ok((decode_form_component(key)?, decode_form_component(value)?.trim().to_string()))
            })
            .collect()
    }

    /// Deserialize the body by content type: JSON, or form fields as a JSON object
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_form() {
            let fields = serde_json::to_value(self.form()?)?;
            return serde_json::from_value(fields).context("form fields do not match the expected shape");
        }
        self.json()
    }
}

fn decode_form_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .with_context(|| format!("form field `{raw}` is not valid UTF-8 after decoding"))
}
