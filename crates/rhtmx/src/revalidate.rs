// File: src/revalidate.rs
// Purpose: Revalidate-after-mutation handle over the page data cache

use crate::request_context::canonical_path;
use rhtmx_loader::{cache_key, LoaderCache};
use serde_json::Value as JsonValue;

/// Invalidates cached page data so the next read reloads it
///
/// Cheap to clone; every clone shares the dispatcher's cache. Page data is
/// keyed by `GET <path>[?query]`, and HEAD requests share the GET entry.
/// Paths may be given percent-encoded or decoded; both match the same entries.
#[derive(Debug, Clone)]
pub struct Revalidator {
    cache: LoaderCache<JsonValue>,
}

impl Revalidator {
    pub fn new(cache: LoaderCache<JsonValue>) -> Self {
        Self { cache }
    }

    /// Revalidate one page path, with every query string it was loaded under
    pub async fn revalidate_path(&self, path: &str) -> usize {
        let base = cache_key("GET", &canonical_path(path));
        let with_query = format!("{base}?");
        let count = self
            .cache
            .invalidate_matching(|key| key == base || key.starts_with(&with_query))
            .await;
        tracing::debug!(path, count, "revalidated path");
        count
    }

    /// Revalidate a path and every page below it
    pub async fn revalidate_subtree(&self, path: &str) -> usize {
        let base = cache_key("GET", &canonical_path(path));
        let prefixes = if base.ends_with('/') {
            // Root: everything is below it.
            vec![base.clone()]
        } else {
            vec![format!("{base}/"), format!("{base}?")]
        };
        let count = self
            .cache
            .invalidate_matching(|key| key == base || prefixes.iter().any(|p| key.starts_with(p.as_str())))
            .await;
        tracing::debug!(path, count, "revalidated subtree");
        count
    }

    /// Revalidate one exact cache key
    pub async fn revalidate_key(&self, key: &str) -> bool {
        self.cache.invalidate(key).await
    }

    pub async fn revalidate_all(&self) -> usize {
        self.cache.invalidate_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rhtmx_loader::EntryState;
    use rstest::rstest;

    async fn seeded(keys: &[&str]) -> LoaderCache<JsonValue> {
        let cache = LoaderCache::default();
        for key in keys {
            cache
                .get_or_load(key, || async { anyhow::Ok(JsonValue::Null) })
                .await
                .unwrap();
        }
        cache
    }

    #[tokio::test]
    async fn test_revalidate_path_covers_query_variants() {
        let cache = seeded(&["GET /blog", "GET /blog?page=2", "GET /blog/a", "GET /blogroll"]).await;
        let revalidator = Revalidator::new(cache.clone());

        assert_eq!(revalidator.revalidate_path("/blog/").await, 2);
        assert_eq!(cache.peek_state("GET /blog/a").await, Some(EntryState::Fresh));
        assert_eq!(cache.peek_state("GET /blogroll").await, Some(EntryState::Fresh));
    }

    #[tokio::test]
    async fn test_revalidate_subtree_respects_segment_boundaries() {
        let cache = seeded(&["GET /blog", "GET /blog/a", "GET /blog/a/b?x=1", "GET /blogroll"]).await;
        let revalidator = Revalidator::new(cache.clone());

        assert_eq!(revalidator.revalidate_subtree("/blog").await, 3);
        assert_eq!(cache.peek_state("GET /blogroll").await, Some(EntryState::Fresh));

        assert_eq!(revalidator.revalidate_subtree("/").await, 4);
    }

    #[rstest]
    #[case("/blog/hello world")]
    #[case("/blog/hello%20world")]
    #[tokio::test]
    async fn test_revalidate_path_accepts_either_encoding(#[case] path: &str) {
        let cache = seeded(&["GET /blog/hello%20world", "GET /blog/hello%20world?c=1"]).await;
        let revalidator = Revalidator::new(cache.clone());

        assert_eq!(revalidator.revalidate_path(path).await, 2);
    }

    #[tokio::test]
    async fn test_revalidate_subtree_with_decoded_prefix() {
        let cache = seeded(&["GET /docs/getting%20started/install", "GET /docs/other"]).await;
        let revalidator = Revalidator::new(cache.clone());

        assert_eq!(revalidator.revalidate_subtree("/docs/getting started").await, 1);
        assert_eq!(cache.peek_state("GET /docs/other").await, Some(EntryState::Fresh));
    }
}
