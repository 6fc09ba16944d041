//! Loader failures shared with every coalesced waiter

use std::sync::Arc;
use thiserror::Error;

/// A failed load
///
/// Cheap to clone: all callers waiting on the same in-flight load receive
/// the same underlying error.
#[derive(Debug, Clone, Error)]
#[error("loader for `{key}` failed: {error:#}")]
pub struct LoadError {
    key: String,
    error: Arc<anyhow::Error>,
}

impl LoadError {
    pub fn new(key: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            key: key.into(),
            error: Arc::new(error),
        }
    }

    /// Cache key whose load failed
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The error returned (or the panic reported) by the loader
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// True when every clone refers to the same failure
    pub fn same_failure(&self, other: &LoadError) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }
}
