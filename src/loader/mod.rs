//! Scroll-anchored incremental loader.
//!
//! Drives the live window of rendered sections: when the reader scrolls
//! near an edge, the loader walks the reference model backwards or
//! forwards from the window boundary, fetches a bounded burst of adjacent
//! sections through the cache, and - for prepends - corrects the scroll
//! offset so the previously-topmost section stays visually stationary.
//!
//! State machine over one [`LoadedWindow`]:
//!
//! ```text
//! Idle --near top edge--> LoadingTop --all members loaded--> Settling --> Idle
//! Idle --near bottom----> LoadingBottom ----------------------------> Idle
//! ```
//!
//! `LoadingTop` and `LoadingBottom` are independent and may overlap; each
//! is guarded by a flag set on entry and cleared only once *every* section
//! requested in that burst has finished loading. Waiting on the whole
//! burst is what makes the settle math sound: against a partially
//! rendered window it would mis-measure.
//!
//! Fetches are never cancelled; a late result for a window that has moved
//! on is simply ignored.

mod surface;
mod window;

pub use surface::{Measurer, ScrollPort};
pub use window::{Highlight, LoadedWindow};

use crate::cache::SectionCache;
use crate::config::LoaderConfig;
use crate::core::{FetchError, RefError};
use crate::fetch::TextFetcher;
use crate::refs::{Direction, Library, Ref};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Loader-level errors surfaced to the embedding application.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("work `{0}` is not registered")]
    UnknownWork(String),
}

/// The scroll-anchored loader: one per active viewer.
pub struct ScrollLoader<F, S> {
    library: Arc<Library>,
    cache: Arc<SectionCache>,
    fetcher: Arc<F>,
    surface: S,
    config: LoaderConfig,
    window: LoadedWindow,
    /// A prepend burst is outstanding.
    loading_top: bool,
    /// An append burst is outstanding.
    loading_bottom: bool,
    /// One-shot: the next scroll event is the echo of a programmatic
    /// write and must not re-enter the loader.
    suppress_scroll: bool,
    /// Offset as a fraction of total height, for percentage re-anchoring
    /// on resize.
    scroll_ratio: f64,
}

impl<F, S> ScrollLoader<F, S>
where
    F: TextFetcher,
    S: Measurer + ScrollPort,
{
    pub fn new(
        library: Arc<Library>,
        cache: Arc<SectionCache>,
        fetcher: Arc<F>,
        surface: S,
        config: LoaderConfig,
    ) -> Self {
        Self {
            library,
            cache,
            fetcher,
            surface,
            config,
            window: LoadedWindow::new(),
            loading_top: false,
            loading_bottom: false,
            suppress_scroll: false,
            scroll_ratio: 0.0,
        }
    }

    pub fn window(&self) -> &LoadedWindow {
        &self.window
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_loading_top(&self) -> bool {
        self.loading_top
    }

    pub fn is_loading_bottom(&self) -> bool {
        self.loading_bottom
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Jump to a locator: fetch its section(s), reset the window, and
    /// place the initial scroll position.
    ///
    /// A single-section window with a highlighted leaf segment scrolls to
    /// that segment; everything else gets the default initial offset.
    pub async fn jump_to(&mut self, raw: &str) -> Result<(), LoaderError> {
        let r = self.library.parse(raw)?;
        let work = self
            .library
            .work_of(&r)
            .ok_or_else(|| LoaderError::UnknownWork(r.book.clone()))?;

        // Spanning refs materialize as their constituent simple pieces; a
        // plain ref's window identity is its section ref.
        let pieces: Vec<Ref> = r
            .split_spanning(&work)
            .into_iter()
            .map(|piece| if piece.is_range() { piece } else { piece.section_ref() })
            .collect();

        let fetch_refs: Vec<Ref> = pieces.iter().map(|p| p.section_ref()).collect();
        for result in self.fetch_burst(&fetch_refs).await {
            result?;
        }

        self.window.reset(pieces);
        if !r.is_range()
            && let Some(segment) = r.leaf_index()
        {
            self.window.set_highlight(r.section_ref(), segment);
        }

        let offset = self.initial_offset();
        self.write_offset(offset);
        crate::debug!("loader"; "jumped to {} ({} sections)", r.humanize(), self.window.len());
        Ok(())
    }

    fn initial_offset(&self) -> f64 {
        if self.window.len() == 1
            && let Some(highlight) = self.window.highlight()
            && let Some(top) = self.surface.segment_top(&highlight.section, highlight.segment)
        {
            return (top - self.config.reserved_top_margin_px).max(0.0);
        }
        self.config.initial_offset_px
    }

    // ------------------------------------------------------------------------
    // Scroll handling
    // ------------------------------------------------------------------------

    /// Feed one observed scroll event into the loader.
    ///
    /// The echo of a programmatic write is consumed here and goes no
    /// further; real movement near an edge triggers a prefetch burst.
    pub async fn on_scroll(&mut self, offset: f64) {
        if self.suppress_scroll {
            self.suppress_scroll = false;
            return;
        }
        self.record_ratio(offset);

        if offset <= self.config.top_threshold_px && !self.loading_top {
            self.load_prev_burst().await;
        }

        let bottom_gap =
            self.surface.total_height() - (offset + self.surface.viewport_height());
        if bottom_gap <= self.config.bottom_threshold_px && !self.loading_bottom {
            self.load_next_burst().await;
        }
    }

    /// Re-anchor after a layout width change: segment heights are stale,
    /// so restore the offset by percentage of total scrollable height.
    pub fn on_resize(&mut self) {
        let total = self.surface.total_height();
        if total <= 0.0 {
            return;
        }
        let target = (self.scroll_ratio * total).clamp(0.0, total);
        self.write_offset(target);
    }

    fn record_ratio(&mut self, offset: f64) {
        let total = self.surface.total_height();
        if total > 0.0 {
            self.scroll_ratio = (offset / total).clamp(0.0, 1.0);
        }
    }

    /// Arm the suppress flag, then move the scroll position.
    fn write_offset(&mut self, offset: f64) {
        self.suppress_scroll = true;
        self.surface.set_offset(offset);
        self.record_ratio(offset);
    }

    // ------------------------------------------------------------------------
    // Bursts
    // ------------------------------------------------------------------------

    /// Greedily extend the window backwards by up to `burst_max` sections,
    /// then correct the scroll offset so the old head keeps its on-screen
    /// position.
    async fn load_prev_burst(&mut self) {
        let Some(anchor) = self.window.first().cloned() else {
            return;
        };
        let chain = self.plan_chain(&anchor, Direction::Prev);
        if chain.is_empty() {
            return;
        }

        self.loading_top = true;
        let results = self.fetch_burst(&chain).await;

        // A late burst for a window that moved on is dropped wholesale.
        if self.window.first() != Some(&anchor) {
            self.loading_top = false;
            return;
        }

        if let Some(err) = results.into_iter().find_map(Result::err) {
            // No Settling on a failed burst: back to Idle, no retry.
            crate::debug!("loader"; "prepend burst abandoned: {err}");
            self.loading_top = false;
            return;
        }

        let count = chain.len();
        self.window.prepend_nearest_first(chain);
        self.settle_after_prepend(&anchor);
        self.loading_top = false;
        crate::debug!("loader"; "prepended {count} sections above {}", anchor.humanize());
    }

    /// Correct the scroll offset after a prepend so the previously-first
    /// section stays visually stationary.
    ///
    /// The target is the anchor's *post-reflow* top minus the reserved
    /// margin, and nothing else - adding the pre-burst scroll offset here
    /// double-counts the scroll position and lands systematically wrong
    /// whenever the viewport was already scrolled down.
    fn settle_after_prepend(&mut self, anchor: &Ref) {
        let Some(top) = self.surface.section_top(anchor) else {
            return;
        };
        let target = (top - self.config.reserved_top_margin_px).max(0.0);
        self.write_offset(target);
    }

    /// Greedily extend the window forwards by up to `burst_max` sections.
    /// Appends need no scroll correction; a partial burst keeps the
    /// contiguous prefix that loaded.
    async fn load_next_burst(&mut self) {
        let Some(from) = self.window.last().cloned() else {
            return;
        };
        let chain = self.plan_chain(&from, Direction::Next);
        if chain.is_empty() {
            return;
        }

        self.loading_bottom = true;
        let results = self.fetch_burst(&chain).await;

        if self.window.last() != Some(&from) {
            self.loading_bottom = false;
            return;
        }

        for (section, result) in chain.into_iter().zip(results) {
            if result.is_err() {
                break;
            }
            self.window.append(section);
        }
        self.loading_bottom = false;
    }

    /// Walk adjacent sections from a boundary, nearest first, up to the
    /// burst cap. Stops at corpus edges and window duplicates.
    fn plan_chain(&self, from: &Ref, direction: Direction) -> Vec<Ref> {
        let mut out: Vec<Ref> = Vec::new();
        let mut cursor = from.clone();
        while out.len() < self.config.burst_max {
            let Some(adjacent) = self.neighbor(&cursor, direction) else {
                break;
            };
            if self.window.contains(&adjacent) || out.contains(&adjacent) {
                break;
            }
            out.push(adjacent.clone());
            cursor = adjacent;
        }
        out
    }

    /// The adjacent section ref: the cached payload's next/prev hint when
    /// the section has been fetched, reference arithmetic otherwise.
    fn neighbor(&self, r: &Ref, direction: Direction) -> Option<Ref> {
        if let Some(payload) = self.cache.get(&r.starting_ref().section_ref()) {
            let hint = match direction {
                Direction::Prev => payload.prev,
                Direction::Next => payload.next,
            };
            return hint
                .and_then(|h| self.library.parse(&h).ok())
                .map(|parsed| parsed.section_ref());
        }
        let work = self.library.work_of(r)?;
        r.adjacent_section(&work, direction)
    }

    /// Fetch every ref of a burst concurrently and wait for *all* of them
    /// - never just the first to resolve. Results come back in burst
    /// order.
    async fn fetch_burst(&self, refs: &[Ref]) -> Vec<Result<(), FetchError>> {
        let mut tasks: JoinSet<(usize, Result<(), FetchError>)> = JoinSet::new();
        for (index, r) in refs.iter().enumerate() {
            let cache = Arc::clone(&self.cache);
            let fetcher = Arc::clone(&self.fetcher);
            let r = r.clone();
            tasks.spawn(async move {
                let result = cache.get_or_fetch(&r, fetcher.as_ref()).await.map(|_| ());
                (index, result)
            });
        }

        let mut results: Vec<Result<(), FetchError>> = refs
            .iter()
            .map(|r| Err(FetchError::Network(format!("fetch for {} never resolved", r.normalize()))))
            .collect();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, result)) = joined {
                results[index] = result;
            }
        }
        results
    }
}
