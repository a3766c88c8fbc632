//! Filter form cache.
//!
//! Rendering the initial filter form needs one aggregation per facet, so
//! the unfiltered rendering is cached per listing with a bounded lifetime.
//! Facet counts and results are never cached here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// Default lifetime of a cached form (one hour).
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Maximum number of cached forms.
const MAX_CAPACITY: u64 = 1_000;

/// Per-listing cache of rendered filter forms.
#[derive(Clone)]
pub struct FormCache {
    inner: Arc<Cache<String, String>>,
}

impl FormCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(cache),
        }
    }

    fn key(listing_id: &str) -> String {
        format!("{listing_id}_FilterForm")
    }

    /// Cached form for a listing, if present.
    pub async fn get(&self, listing_id: &str) -> Option<String> {
        self.inner.get(&Self::key(listing_id)).await
    }

    /// Return the cached form, or render and store it.
    ///
    /// With `flush` set the cached entry is ignored and replaced. A failed
    /// render leaves the cache untouched. Concurrent misses may both render;
    /// the last write wins.
    pub async fn get_or_render<F, Fut>(
        &self,
        listing_id: &str,
        flush: bool,
        render: F,
    ) -> anyhow::Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let key = Self::key(listing_id);

        if !flush && let Some(html) = self.inner.get(&key).await {
            debug!(key = %key, "filter form cache hit");
            return Ok(html);
        }

        let html = render().await?;
        self.inner.insert(key.clone(), html.clone()).await;
        debug!(key = %key, flush, "filter form cached");
        Ok(html)
    }

    /// Drop a listing's cached form.
    pub async fn invalidate(&self, listing_id: &str) {
        self.inner.invalidate(&Self::key(listing_id)).await;
        debug!(listing = %listing_id, "filter form cache invalidated");
    }
}

impl Default for FormCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn render_counting(
        cache: &FormCache,
        calls: &AtomicUsize,
        flush: bool,
    ) -> anyhow::Result<String> {
        cache
            .get_or_render("products", flush, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("<form>{n}</form>"))
            })
            .await
    }

    #[tokio::test]
    async fn renders_once_then_hits() {
        let cache = FormCache::default();
        let calls = AtomicUsize::new(0);

        assert_eq!(render_counting(&cache, &calls, false).await.unwrap(), "<form>1</form>");
        assert_eq!(render_counting(&cache, &calls, false).await.unwrap(), "<form>1</form>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_recomputes_and_replaces() {
        let cache = FormCache::default();
        let calls = AtomicUsize::new(0);

        render_counting(&cache, &calls, false).await.unwrap();
        assert_eq!(render_counting(&cache, &calls, true).await.unwrap(), "<form>2</form>");
        assert_eq!(cache.get("products").await.as_deref(), Some("<form>2</form>"));
    }

    #[tokio::test]
    async fn failed_render_is_not_cached() {
        let cache = FormCache::default();
        let result = cache
            .get_or_render("products", false, || async { Err(anyhow::anyhow!("store down")) })
            .await;

        assert!(result.is_err());
        assert!(cache.get("products").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_drops_entry() {
        let cache = FormCache::default();
        let calls = AtomicUsize::new(0);

        render_counting(&cache, &calls, false).await.unwrap();
        cache.invalidate("products").await;

        assert!(cache.get("products").await.is_none());
        render_counting(&cache, &calls, false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
