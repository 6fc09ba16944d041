//! Loader cache configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for a [`LoaderCache`](crate::LoaderCache)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Optional age after which a fresh entry is reloaded
    ///
    /// `None` keeps entries until they are explicitly invalidated.
    pub max_age: Option<Duration>,
}

impl LoaderConfig {
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// `[loader]` section of rhtml.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderTomlConfig {
    /// Maximum age of a cached loader result in seconds
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl LoaderTomlConfig {
    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_age: self.max_age_secs.map(Duration::from_secs),
        }
    }
}
