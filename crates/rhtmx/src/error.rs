// File: src/error.rs
// Purpose: Per-request dispatch failures and their HTTP status codes

use axum::http::StatusCode;
use rhtmx_loader::LoadError;
use thiserror::Error;

/// Why a matched request did not produce a normal response
///
/// Raised anywhere below the dispatcher and converted to a response only
/// at its boundary. Errors that pass through a middleware's `?` keep their
/// variant, so the status code survives.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method not allowed (allow: {allow})")]
    MethodNotAllowed { allow: String },

    #[error("middleware `{name}` returned without a response or calling next")]
    MiddlewareProtocol { name: String },

    #[error("middleware `{name}` failed: {error:#}")]
    Middleware { name: String, error: anyhow::Error },

    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),

    #[error(transparent)]
    Loader(#[from] LoadError),

    #[error("render failed: {0:#}")]
    Render(anyhow::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Recovers a dispatch error that was carried through `anyhow`
    ///
    /// Anything else is treated as a handler failure.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        error
            .downcast::<DispatchError>()
            .unwrap_or_else(DispatchError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_through_anyhow_keeps_variant() {
        let carried = anyhow::Error::from(DispatchError::MethodNotAllowed {
            allow: "GET".into(),
        });
        let recovered = DispatchError::from_anyhow(carried);
        assert_eq!(recovered.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_foreign_error_becomes_handler_failure() {
        let recovered = DispatchError::from_anyhow(anyhow::anyhow!("disk full"));
        assert!(matches!(recovered, DispatchError::Handler(_)));
        assert_eq!(recovered.to_string(), "handler failed: disk full");
    }

    #[test]
    fn test_loader_error_message() {
        let err = DispatchError::from(LoadError::new("GET /blog", anyhow::anyhow!("db down")));
        assert_eq!(err.to_string(), "loader for `GET /blog` failed: db down");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
