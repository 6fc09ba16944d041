//! Concurrency tests for the loader cache
//!
//! These run on the multi-threaded runtime so that coalescing and
//! invalidation races actually interleave.

use pretty_assertions::assert_eq;
use rhtmx_loader::{EntryState, LoadError, LoaderCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Barrier};

async fn wait_for_state(cache: &LoaderCache<u32>, key: &str, state: EntryState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while cache.peek_state(key).await != Some(state) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("entry never reached expected state");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_share_one_load() {
    let cache = LoaderCache::<String>::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get_or_load("GET /blog", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        anyhow::Ok("posts".to_string())
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "posts");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits + stats.coalesced, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_keys_load_independently() {
    let cache = LoaderCache::<u32>::default();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let blocked = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_load("slow", move || async move {
                    release_rx.await.ok();
                    anyhow::Ok(1)
                })
                .await
        })
    };
    wait_for_state(&cache, "slow", EntryState::Pending).await;

    // Completes while "slow" is still loading.
    let fast = cache.get_or_load("fast", || async { anyhow::Ok(2) }).await.unwrap();
    assert_eq!(fast, 2);

    release_tx.send(()).unwrap();
    assert_eq!(blocked.await.unwrap().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalesced_waiters_share_failure() {
    let cache = LoaderCache::<u32>::default();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get_or_load("k", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<u32, _>(anyhow::anyhow!("upstream unavailable"))
                    })
                    .await
            })
        })
        .collect();

    let mut errors = Vec::new();
    for handle in handles {
        errors.push(handle.await.unwrap().unwrap_err());
    }

    let mut distinct: Vec<&LoadError> = Vec::new();
    for err in &errors {
        if !distinct.iter().any(|seen| seen.same_failure(err)) {
            distinct.push(err);
        }
    }

    assert!(errors.iter().all(|err| err.key() == "k"));
    assert!(distinct.len() < errors.len());
    assert_eq!(distinct.len() as u64, cache.stats().await.failures);
    assert_eq!(cache.peek_state("k").await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidation_during_load_is_not_overwritten() {
    let cache = LoaderCache::<u32>::default();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_load("k", move || async move {
                    release_rx.await.ok();
                    anyhow::Ok(1)
                })
                .await
        })
    };
    wait_for_state(&cache, "k", EntryState::Pending).await;

    assert!(cache.invalidate("k").await);
    assert_eq!(cache.peek_state("k").await, Some(EntryState::Pending));

    // Arrives after the invalidation: must not be handed the older result.
    let second = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_or_load("k", || async { anyhow::Ok(2) }).await })
    };

    release_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap(), 1);
    assert_eq!(second.await.unwrap().unwrap(), 2);
    assert_eq!(cache.peek_state("k").await, Some(EntryState::Fresh));
    assert_eq!(cache.peek("k").await, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_caller_does_not_cancel_load() {
    let cache = LoaderCache::<u32>::default();

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_load("k", || async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    anyhow::Ok(7)
                })
                .await
        })
    };
    wait_for_state(&cache, "k", EntryState::Pending).await;
    caller.abort();

    wait_for_state(&cache, "k", EntryState::Fresh).await;
    assert_eq!(cache.peek("k").await, Some(7));
}

#[tokio::test]
async fn test_repeated_reads_invoke_loader_once() {
    let cache = LoaderCache::<u32>::default();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let calls = Arc::clone(&calls);
        let value = cache
            .get_or_load("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Revalidation forces exactly one more load, however soon it follows.
    cache.invalidate("k").await;
    let calls_after = Arc::clone(&calls);
    cache
        .get_or_load("k", move || async move {
            calls_after.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(43)
        })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
