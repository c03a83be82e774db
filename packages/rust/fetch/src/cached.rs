//! Page source backed by the libSQL page cache.

use std::sync::Arc;

use rosetta_shared::{PageKind, Result, RosettaError};
use rosetta_storage::Storage;
use tracing::{debug, instrument, warn};

use crate::PageSource;

/// Wraps another source with the on-disk page cache.
///
/// Hits never reach the inner source. Misses are fetched and stored, except
/// for pages the inner source reports missing, which are never cached. In
/// offline mode a miss is reported as not found without touching the inner
/// source.
pub struct CachedPageSource<S> {
    inner: S,
    storage: Arc<Storage>,
    offline: bool,
}

impl<S: PageSource> CachedPageSource<S> {
    pub fn new(inner: S, storage: Arc<Storage>) -> Self {
        Self {
            inner,
            storage,
            offline: false,
        }
    }

    /// Serve only what is already cached.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}

impl<S: PageSource> PageSource for CachedPageSource<S> {
    #[instrument(skip(self, kind), fields(%kind, offline = self.offline))]
    async fn fetch(&self, kind: PageKind, name: &str) -> Result<String> {
        if let Some(page) = self.storage.get_page(kind, name).await? {
            debug!(fetched_at = %page.fetched_at, "cache hit");
            return Ok(page.body);
        }

        if self.offline {
            debug!("cache miss in offline mode");
            return Err(RosettaError::not_found(kind, name));
        }

        let body = self.inner.fetch(kind, name).await?;
        if let Err(e) = self.storage.put_page(kind, name, &body).await {
            warn!(error = %e, "failed to cache page");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryPageSource;
    use uuid::Uuid;

    async fn test_storage() -> Arc<Storage> {
        let tmp = std::env::temp_dir().join(format!("rc_fetch_test_{}.db", Uuid::now_v7()));
        Arc::new(Storage::open(&tmp).await.expect("open test db"))
    }

    #[tokio::test]
    async fn miss_then_hit_calls_inner_once() {
        let inner = MemoryPageSource::new().with_page(PageKind::Task, "A", "==C==\n");
        let source = CachedPageSource::new(inner, test_storage().await);

        assert_eq!(source.fetch(PageKind::Task, "A").await.unwrap(), "==C==\n");
        assert_eq!(source.fetch(PageKind::Task, "A").await.unwrap(), "==C==\n");
        assert_eq!(source.inner.fetch_count(), 1);

        let cached = source.storage().get_page(PageKind::Task, "A").await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let source = CachedPageSource::new(MemoryPageSource::new(), test_storage().await);

        let err = source.fetch(PageKind::Task, "Missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(source.storage().list_pages(None).await.unwrap().is_empty());

        source.fetch(PageKind::Task, "Missing").await.unwrap_err();
        assert_eq!(source.inner.fetch_count(), 2);
    }

    #[tokio::test]
    async fn offline_serves_cache_only() {
        let storage = test_storage().await;
        storage.put_page(PageKind::Category, "Puzzles", "<ul></ul>").await.unwrap();

        let inner = MemoryPageSource::new().with_page(PageKind::Task, "A", "text");
        let source = CachedPageSource::new(inner, storage).with_offline(true);

        assert_eq!(
            source.fetch(PageKind::Category, "Puzzles").await.unwrap(),
            "<ul></ul>"
        );
        assert!(source.fetch(PageKind::Task, "A").await.unwrap_err().is_not_found());
        assert_eq!(source.inner.fetch_count(), 0);
    }
}
