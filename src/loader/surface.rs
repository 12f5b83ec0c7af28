//! Render-surface capabilities.
//!
//! The loader never touches a real rendering surface; it measures and
//! scrolls through these two traits. That keeps the anchor math unit
//! testable - a fake surface with programmed offsets stands in for layout.

use crate::refs::Ref;

/// Read-side measurements of the rendered column.
///
/// Positions are in pixels from the top of the scrollable content, as laid
/// out *now* - after any reflow caused by inserted sections.
pub trait Measurer {
    /// Top offset of a rendered section, if it is currently materialized.
    fn section_top(&self, section: &Ref) -> Option<f64>;

    /// Top offset of one segment (0-based) within a rendered section.
    fn segment_top(&self, section: &Ref, segment: u32) -> Option<f64>;

    /// Height of the whole scrollable content.
    fn total_height(&self) -> f64;

    /// Height of the visible viewport.
    fn viewport_height(&self) -> f64;
}

/// Write-side control of the scroll position.
pub trait ScrollPort {
    /// Current scroll offset in pixels.
    fn offset(&self) -> f64;

    /// Move the scroll position. Calls from the loader are always preceded
    /// by arming the suppress flag, so the resulting scroll event does not
    /// re-enter it.
    fn set_offset(&mut self, offset: f64);
}
