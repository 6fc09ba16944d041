//! # RHTMX Loader - page data cache
//!
//! Keeps the result of each page loader, keyed by request, and reuses it
//! until it is explicitly revalidated.
//!
//! ## Features
//!
//! - **Single-flight**: concurrent reads of one key share a single load
//! - **Revalidation**: `invalidate` marks an entry stale; the next read reloads
//! - **Failure isolation**: a failed load keeps the previous value for later reads
//! - **Optional max age**: entries can also go stale after a fixed age
//!
//! ## Example
//!
//! ```rust
//! use rhtmx_loader::{cache_key, LoaderCache, LoaderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = LoaderCache::new(LoaderConfig::default());
//!     let key = cache_key("GET", "/blog");
//!
//!     let posts = cache.get_or_load(&key, || async { anyhow::Ok(vec!["hello"]) }).await.unwrap();
//!     assert_eq!(posts, vec!["hello"]);
//!
//!     // After a mutation
//!     cache.invalidate(&key).await;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;

pub use cache::{cache_key, CacheStats, EntryState};
pub use config::{LoaderConfig, LoaderTomlConfig};
pub use engine::LoaderCache;
pub use error::LoadError;
