//! Small TTL cache collaborator.
//!
//! Holds one `{value, fetched_at}` slot behind an async mutex: `get_or_fetch`
//! serves the cached value while it is fresh and refetches on miss or
//! expiry. Used for the live-stream lookup, which would otherwise hammer the
//! provider on every page load.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: Mutex::new(None) }
    }

    /// Return the cached value if it is younger than the TTL, otherwise run
    /// `fetch`, store its result and return it. Errors are not cached: the
    /// next call fetches again. The lock is held across the fetch so
    /// concurrent callers do not stampede the provider.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let value = fetch().await?;
        *slot = Some(Entry { value: value.clone(), fetched_at: Instant::now() });
        Ok(value)
    }

    /// Drop the cached value so the next call refetches.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_get_within_ttl_does_not_refetch() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<i32, Infallible> = cache
                .get_or_fetch(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value.unwrap(), 42);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let cache = TtlCache::new(Duration::from_millis(0));
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Result<i32, Infallible> = cache
                .get_or_fetch(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await;
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        let first: Result<i32, &str> = cache
            .get_or_fetch(|| async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            })
            .await;
        assert!(first.is_err());

        let second: Result<i32, &str> = cache
            .get_or_fetch(|| async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(second.unwrap(), 7);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        let _: Result<i32, Infallible> = cache
            .get_or_fetch(|| async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;
        cache.invalidate().await;
        let _: Result<i32, Infallible> = cache
            .get_or_fetch(|| async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await;

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
