//! In-memory page source.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use rosetta_shared::{PageKind, Result, RosettaError};

use crate::PageSource;

/// Serves pages from a map. Unknown names are reported as not found.
#[derive(Debug, Default)]
pub struct MemoryPageSource {
    pages: RwLock<HashMap<(PageKind, String), String>>,
    fetches: AtomicUsize,
}

impl MemoryPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_page(self, kind: PageKind, name: &str, body: impl Into<String>) -> Self {
        self.insert(kind, name, body);
        self
    }

    pub fn insert(&self, kind: PageKind, name: &str, body: impl Into<String>) {
        let mut pages = self.pages.write().unwrap_or_else(|e| e.into_inner());
        pages.insert((kind, name.to_string()), body.into());
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PageSource for MemoryPageSource {
    async fn fetch(&self, kind: PageKind, name: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().unwrap_or_else(|e| e.into_inner());
        pages
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| RosettaError::not_found(kind, name))
    }
}
