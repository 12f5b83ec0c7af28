//! Per-book preferred-version map.
//!
//! Readers can pin a book to a specific edition; `get_or_fetch` tries the
//! pinned variant first and falls back to the default fetch on failure.
//! Reads vastly outnumber writes, so the map is an arc-swap snapshot:
//! lookups are lock-free, updates clone-and-swap.

use crate::fetch::VersionSelector;
use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Book title -> pinned edition.
#[derive(Debug, Default)]
pub struct PreferredVersions {
    map: ArcSwap<FxHashMap<String, VersionSelector>>,
}

impl PreferredVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pinned edition for a book, if any.
    pub fn get(&self, book: &str) -> Option<VersionSelector> {
        self.map.load().get(book).cloned()
    }

    /// Pin a book to an edition.
    pub fn set(&self, book: impl Into<String>, version: VersionSelector) {
        let book = book.into();
        let mut next = FxHashMap::clone(&self.map.load());
        next.insert(book, version);
        self.map.store(Arc::new(next));
    }

    /// Remove a book's pin.
    pub fn clear(&self, book: &str) {
        if !self.map.load().contains_key(book) {
            return;
        }
        let mut next = FxHashMap::clone(&self.map.load());
        next.remove(book);
        self.map.store(Arc::new(next));
    }

    pub fn is_empty(&self) -> bool {
        self.map.load().is_empty()
    }
}
