//! The live ordered window of materialized sections.

use crate::refs::Ref;
use std::collections::VecDeque;

/// A highlighted segment within a loaded section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub section: Ref,
    /// 0-based segment index within the section.
    pub segment: u32,
}

/// Ordered sequence of section refs currently materialized by the viewer.
///
/// Mutated only by the loader; one instance per active viewer. Spanning
/// refs are split before placement, and a non-spanning ref's identity here
/// is its section ref.
#[derive(Debug, Default)]
pub struct LoadedWindow {
    sections: VecDeque<Ref>,
    highlight: Option<Highlight>,
}

impl LoadedWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn first(&self) -> Option<&Ref> {
        self.sections.front()
    }

    pub fn last(&self) -> Option<&Ref> {
        self.sections.back()
    }

    pub fn contains(&self, r: &Ref) -> bool {
        self.sections.contains(r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ref> {
        self.sections.iter()
    }

    /// Replace the window contents.
    pub fn reset(&mut self, sections: impl IntoIterator<Item = Ref>) {
        self.sections = sections.into_iter().collect();
        self.highlight = None;
    }

    /// Prepend a burst given nearest-first: the first ref ends up adjacent
    /// to the old head, the last becomes the new head.
    pub fn prepend_nearest_first(&mut self, sections: impl IntoIterator<Item = Ref>) {
        for section in sections {
            self.sections.push_front(section);
        }
    }

    /// Append one section at the end.
    pub fn append(&mut self, section: Ref) {
        self.sections.push_back(section);
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    pub fn set_highlight(&mut self, section: Ref, segment: u32) {
        self.highlight = Some(Highlight { section, segment });
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
    }
}
