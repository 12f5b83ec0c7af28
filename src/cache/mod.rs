//! Content-addressed section cache.
//!
//! Entries are keyed by normalized ref and stored at the coarsest level
//! that still disambiguates section-equivalent granularity - one level
//! above the finest grain, never at leaf depth. Every leaf key implied by
//! a stored payload gets a *sentinel* entry meaning "derive me from a
//! stored ancestor": a leaf lookup clones the ancestor payload, overlays
//! the finer address and slices the text down to it, with no second fetch.
//!
//! One cache instance per session, shared via `Arc`; interior mutability
//! keeps the public surface `&self`.

mod version;

pub use version::PreferredVersions;

use crate::core::{FetchError, RefError};
use crate::fetch::{TextFetcher, TextPayload};
use crate::refs::{Library, Ref};
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// A stored cache record.
#[derive(Debug, Clone)]
enum CacheEntry {
    /// A complete payload.
    Full(Box<TextPayload>),
    /// Derivable from the nearest stored ancestor by clone-and-trim.
    Derivable,
}

/// Content-addressed store of fetched text at section granularity.
pub struct SectionCache {
    library: Arc<Library>,
    entries: RwLock<FxHashMap<String, CacheEntry>>,
    /// One outstanding fetch per distinct normalized key; later callers
    /// await the receiver and re-check the cache.
    inflight: DashMap<String, watch::Receiver<()>>,
    versions: PreferredVersions,
}

impl SectionCache {
    pub fn new(library: Arc<Library>) -> Self {
        Self {
            library,
            entries: RwLock::new(FxHashMap::default()),
            inflight: DashMap::new(),
            versions: PreferredVersions::new(),
        }
    }

    /// Number of stored entries (full and sentinel).
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry. Preferred versions survive.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn contains(&self, r: &Ref) -> bool {
        self.entries.read().contains_key(&r.normalize())
    }

    /// The per-book preferred-version map.
    pub fn versions(&self) -> &PreferredVersions {
        &self.versions
    }

    /// Seed the preferred-version map from configuration.
    pub fn apply_config(&self, config: &crate::config::CacheConfig) {
        for (book, version) in &config.preferred_versions {
            self.versions.set(book.clone(), version.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Look up a payload, deriving finer-grained views from stored
    /// ancestors where a sentinel marks them reachable.
    pub fn get(&self, r: &Ref) -> Option<TextPayload> {
        let entries = self.entries.read();
        match entries.get(&r.normalize()) {
            Some(CacheEntry::Full(payload)) => Some((**payload).clone()),
            Some(CacheEntry::Derivable) => {
                // Strip one address component at a time until a full
                // ancestor turns up.
                let mut ancestor = r.parent();
                while let Some(a) = ancestor {
                    if let Some(CacheEntry::Full(payload)) = entries.get(&a.normalize()) {
                        return Some(derive_view(payload, &a, r));
                    }
                    ancestor = a.parent();
                }
                None
            }
            None => None,
        }
    }

    // ------------------------------------------------------------------------
    // Save / invalidate
    // ------------------------------------------------------------------------

    /// Store a fetched payload, trimmed to one level above leaf
    /// granularity, and write a sentinel for every leaf key its content
    /// implies. Returns the ref the payload was stored under.
    ///
    /// Error payloads never reach this function; see
    /// [`SectionCache::get_or_fetch`].
    pub fn save(&self, payload: TextPayload) -> Result<Ref, RefError> {
        let parsed = self.library.parse(&payload.tref)?;
        let leaf_depth = parsed.address_types.len();

        let (stored_ref, mut payload) = if leaf_depth > 0 && parsed.depth() == leaf_depth {
            // Leaf-grade address: store one level up.
            match parsed.parent() {
                Some(parent) => (parent, payload),
                None => (parsed, payload),
            }
        } else {
            (parsed, payload)
        };
        payload.sections = stored_ref.sections.clone();
        payload.to_sections = stored_ref.to_sections.clone();

        let key = stored_ref.normalize();
        let mut entries = self.entries.write();
        crate::debug!("cache"; "saved {} ({} segments)", key, payload.text.segment_count());

        // Sentinels map each segment to its leaf key; ranges don't cover
        // whole sections, so they only get their own entry.
        if !stored_ref.is_range() && stored_ref.depth() + 1 == leaf_depth {
            if let Some(&leaf_at) = stored_ref.address_types.last() {
                let count = payload.text.segment_count() as u32;
                for i in 0..count {
                    let component = leaf_at.from_ordinal(leaf_at.first_ordinal() + i);
                    let child_key = stored_ref.child(component).normalize();
                    entries.entry(child_key).or_insert(CacheEntry::Derivable);
                }
            }
        }

        entries.insert(key, CacheEntry::Full(Box::new(payload)));
        Ok(stored_ref)
    }

    /// Remove the entry at this ref's key. When the key is absent and has
    /// more than one address component, also removes the parent-level key -
    /// the case where only a trimmed ancestor entry exists.
    pub fn kill(&self, r: &Ref) {
        let key = r.normalize();
        let mut entries = self.entries.write();
        if entries.remove(&key).is_none() && r.depth() > 1 {
            if let Some(parent) = r.parent() {
                entries.remove(&parent.normalize());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Fetch-through
    // ------------------------------------------------------------------------

    /// Serve from cache, or fetch, save, and return. The save completes
    /// strictly before this returns, so a synchronous `get` for the same
    /// or a finer ref immediately afterwards observes the new entry.
    ///
    /// Fetch failures pass through untouched and are never written into
    /// the cache; the cache does not retry.
    pub async fn get_or_fetch<F: TextFetcher>(
        &self,
        r: &Ref,
        fetcher: &F,
    ) -> Result<TextPayload, FetchError> {
        let key = r.normalize();
        loop {
            if let Some(hit) = self.get(r) {
                return Ok(hit);
            }

            // Join an outstanding fetch for the same key instead of
            // issuing a second one.
            let pending = self.inflight.get(&key).map(|entry| entry.value().clone());
            if let Some(mut rx) = pending {
                // Err means the sender dropped, i.e. the fetch settled.
                let _ = rx.changed().await;
                continue;
            }

            let (tx, rx) = watch::channel(());
            self.inflight.insert(key.clone(), rx);
            let fetched = self.fetch_preferring_version(&key, r, fetcher).await;
            self.inflight.remove(&key);
            drop(tx);

            return match fetched {
                Ok(payload) => {
                    self.save(payload.clone())
                        .map_err(|e| FetchError::payload(&key, e.to_string()))?;
                    Ok(self.get(r).unwrap_or(payload))
                }
                Err(e) => Err(e),
            };
        }
    }

    /// Fetch with the book's pinned edition when one is set, falling back
    /// to the default fetch if the pinned variant fails.
    async fn fetch_preferring_version<F: TextFetcher>(
        &self,
        key: &str,
        r: &Ref,
        fetcher: &F,
    ) -> Result<TextPayload, FetchError> {
        if let Some(version) = self.versions.get(&r.book) {
            match fetcher.fetch_text(key, Some(&version)).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    crate::debug!("cache"; "pinned edition failed for {key}: {e}");
                }
            }
        }
        fetcher.fetch_text(key, None).await
    }
}

/// Reconstruct a finer-grained view from a stored ancestor: clone, overlay
/// the requested address, slice the text down to it.
fn derive_view(parent: &TextPayload, parent_ref: &Ref, r: &Ref) -> TextPayload {
    let mut out = parent.clone();
    out.tref = r.humanize();
    out.sections = r.sections.clone();
    out.to_sections = r.to_sections.clone();

    if !r.is_range() {
        let parent_depth = parent_ref.depth();
        for (i, component) in r.sections[parent_depth..].iter().enumerate() {
            let Some(&at) = r.address_types.get(parent_depth + i) else {
                break;
            };
            let Ok(ordinal) = at.ordinal(component) else {
                break;
            };
            let index = (ordinal - at.first_ordinal()) as usize;
            match out.text.at(index) {
                Some(sub) => {
                    out.text = sub.clone();
                    out.text_depth = out.text_depth.saturating_sub(1);
                }
                None => break,
            }
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ShapePayload, TextContent, VersionSelector};
    use crate::schema::{AddressType, Work};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn library() -> Arc<Library> {
        let mut lib = Library::new();
        lib.register(
            Work::uniform("Genesis", vec![AddressType::Integer, AddressType::Integer])
                .with_lengths(vec![31, 25, 24]),
        )
        .unwrap();
        Arc::new(lib)
    }

    fn chapter_payload(chapter: u32, segments: &[&str]) -> TextPayload {
        TextPayload {
            tref: format!("Genesis {chapter}"),
            section_ref: format!("Genesis {chapter}"),
            sections: [chapter.to_string()].into_iter().collect(),
            to_sections: [chapter.to_string()].into_iter().collect(),
            text_depth: 1,
            categories: vec!["Tanakh".to_string()],
            is_spanning: false,
            spanning_refs: Vec::new(),
            next: Some(format!("Genesis {}", chapter + 1)),
            prev: (chapter > 1).then(|| format!("Genesis {}", chapter - 1)),
            text: TextContent::Sections(
                segments
                    .iter()
                    .map(|s| TextContent::Segment(s.to_string()))
                    .collect(),
            ),
            version: None,
        }
    }

    /// Programmable fetcher: serves chapter payloads, counts calls, can be
    /// told to fail specific keys or all versioned fetches.
    struct FakeFetcher {
        calls: AtomicUsize,
        fail_keys: Vec<String>,
        fail_versioned: bool,
        delay: Option<Duration>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_keys: Vec::new(),
                fail_versioned: false,
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextFetcher for FakeFetcher {
        async fn fetch_text(
            &self,
            tref: &str,
            version: Option<&VersionSelector>,
        ) -> Result<TextPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_versioned && version.is_some() {
                return Err(FetchError::backend(tref, "no such version"));
            }
            if self.fail_keys.iter().any(|k| k == tref) {
                return Err(FetchError::backend(tref, "boom"));
            }
            let chapter: u32 = tref
                .rsplit('.')
                .next()
                .and_then(|c| c.parse().ok())
                .unwrap_or(1);
            Ok(chapter_payload(chapter, &["one", "two", "three", "four", "five", "six", "seven"]))
        }

        async fn fetch_shape(&self, title: &str) -> Result<ShapePayload, FetchError> {
            Err(FetchError::backend(title, "no shapes here"))
        }
    }

    #[test]
    fn test_save_stores_at_section_key_with_sentinels() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        cache.save(chapter_payload(1, &["a", "b", "c"])).unwrap();

        assert!(cache.contains(&lib.parse("Genesis 1").unwrap()));
        // 1 full entry + 3 sentinels
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_reconstruction_from_sentinel() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        cache.save(chapter_payload(1, &["a", "b", "c", "d", "e", "f", "g"])).unwrap();

        let leaf = lib.parse("Genesis 1:7").unwrap();
        let view = cache.get(&leaf).expect("derived view");
        assert_eq!(view.sections.as_slice(), ["1".to_string(), "7".to_string()]);
        assert_eq!(view.to_sections, view.sections);
        assert_eq!(view.text, TextContent::Segment("g".to_string()));
        assert_eq!(view.text_depth, 0);
        assert_eq!(view.section_ref, "Genesis 1");
    }

    #[test]
    fn test_leaf_grade_payload_trimmed_on_save() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        let mut payload = chapter_payload(1, &["a", "b"]);
        payload.tref = "Genesis 1:2".to_string();
        payload.sections = ["1".to_string(), "2".to_string()].into_iter().collect();
        payload.to_sections = payload.sections.clone();

        let stored = cache.save(payload).unwrap();
        assert_eq!(stored.normalize(), "Genesis.1");
    }

    #[test]
    fn test_kill_removes_entry_and_sentinel_derivation_fails() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        cache.save(chapter_payload(1, &["a", "b", "c"])).unwrap();

        let section = lib.parse("Genesis 1").unwrap();
        cache.kill(&section);
        assert!(cache.get(&section).is_none());
        // The deeper sentinel still exists but no longer derives anything
        assert!(cache.get(&lib.parse("Genesis 1:2").unwrap()).is_none());
    }

    #[test]
    fn test_kill_falls_back_to_parent_key() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        cache.save(chapter_payload(2, &["a"])).unwrap();

        // "Genesis 2:5" has no entry of its own (only segment 1 got a
        // sentinel), so kill falls back to the stored section key.
        let leaf = lib.parse("Genesis 2:5").unwrap();
        cache.kill(&leaf);
        assert!(cache.get(&lib.parse("Genesis 2").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_reconstruction_avoids_second_fetch() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        let fetcher = FakeFetcher::new();

        let section = lib.parse("Genesis 1").unwrap();
        cache.get_or_fetch(&section, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        let leaf = lib.parse("Genesis 1:3").unwrap();
        let view = cache.get_or_fetch(&leaf, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls(), 1, "leaf lookup must not refetch");
        assert_eq!(view.text, TextContent::Segment("three".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_failure_not_cached() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        let mut fetcher = FakeFetcher::new();
        fetcher.fail_keys.push("Genesis.1".to_string());

        let section = lib.parse("Genesis 1").unwrap();
        let err = cache.get_or_fetch(&section, &fetcher).await.unwrap_err();
        assert!(matches!(err, FetchError::Backend { .. }));
        assert!(cache.is_empty());

        // No retry happened inside the cache; a new call issues a new fetch
        let _ = cache.get_or_fetch(&section, &fetcher).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_inflight_dedup_single_fetch() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        let mut fetcher = FakeFetcher::new();
        fetcher.delay = Some(Duration::from_millis(10));

        let section = lib.parse("Genesis 1").unwrap();
        let (a, b) = tokio::join!(
            cache.get_or_fetch(&section, &fetcher),
            cache.get_or_fetch(&section, &fetcher),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetcher.calls(), 1, "concurrent callers must share one fetch");
    }

    #[tokio::test]
    async fn test_preferred_version_falls_back_to_default() {
        let lib = library();
        let cache = SectionCache::new(lib.clone());
        let mut fetcher = FakeFetcher::new();
        fetcher.fail_versioned = true;

        cache
            .versions()
            .set("Genesis", VersionSelector::new("en", "Missing Edition"));

        let section = lib.parse("Genesis 1").unwrap();
        let payload = cache.get_or_fetch(&section, &fetcher).await.unwrap();
        assert_eq!(payload.sections.as_slice(), ["1".to_string()]);
        // One failed versioned attempt, one default fetch
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_apply_config_seeds_versions() {
        let config: crate::config::ReaderConfig = toml::from_str(
            "[cache.preferred_versions.\"Genesis\"]\nlanguage = \"he\"\nversionTitle = \"Base\"\n",
        )
        .unwrap();
        let cache = SectionCache::new(library());
        cache.apply_config(&config.cache);
        assert_eq!(cache.versions().get("Genesis").unwrap().language, "he");
    }

    #[test]
    fn test_clear_keeps_versions() {
        let lib = library();
        let cache = SectionCache::new(lib);
        cache.versions().set("Genesis", VersionSelector::new("he", "Base"));
        cache.save(chapter_payload(1, &["a"])).unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.versions().get("Genesis").is_some());
    }
}
