//! Structured text locators.
//!
//! A [`Ref`] is a parsed locator: a work title, the non-default structural
//! node-path inside it, and address components from the root down to the
//! most specific point, with a parallel `to_sections` end for ranges.
//!
//! Canonical forms:
//! - `normalize()`: `Book,_Node.1.3-2.5` (the compatibility-sensitive URL
//!   form - any deviation breaks bookmarked links)
//! - `humanize()`: `Book, Node 1:3-2:5` (reader-facing)

mod library;
mod parse;

pub use library::Library;

use crate::schema::{AddressType, Work, build_title, build_url};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Characters kept verbatim in the encoded URL form.
const URL_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'_')
    .remove(b',')
    .remove(b'-');

/// Direction of section arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

// ============================================================================
// Ref
// ============================================================================

/// A parsed locator.
///
/// Invariant: `to_sections.len() == sections.len()` on every constructed
/// value; the parser pads the end side by copying `sections` and overlaying
/// the explicit range suffix from the right.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    /// Canonical work title.
    pub book: String,

    /// Non-default structural titles traversed below the work root.
    #[serde(default)]
    pub node_path: SmallVec<[String; 2]>,

    /// Address type per depth at the resolved node.
    #[serde(default)]
    pub address_types: SmallVec<[AddressType; 4]>,

    /// Address components, root-down, in canonical form.
    pub sections: SmallVec<[String; 4]>,

    /// End of the range; equals `sections` for a non-range ref.
    pub to_sections: SmallVec<[String; 4]>,
}

impl Ref {
    /// Number of address components present.
    pub fn depth(&self) -> usize {
        self.sections.len()
    }

    /// Depth of a section-level (chapter-equivalent) address: one above
    /// the finest addressed depth.
    pub fn section_depth(&self) -> usize {
        self.address_types.len().saturating_sub(1)
    }

    /// Whether this ref addresses the finest grain of its work.
    pub fn is_leaf_depth(&self) -> bool {
        !self.address_types.is_empty() && self.depth() == self.address_types.len()
    }

    pub fn is_range(&self) -> bool {
        self.sections != self.to_sections
    }

    /// First index at which `sections` and `to_sections` differ.
    ///
    /// Determines how much of the range suffix is shown in canonical and
    /// display forms.
    pub fn first_diff_index(&self) -> Option<usize> {
        self.sections
            .iter()
            .zip(self.to_sections.iter())
            .position(|(a, b)| a != b)
    }

    /// True when the range crosses a boundary above the finest depth.
    pub fn is_spanning(&self) -> bool {
        match self.first_diff_index() {
            Some(i) => i + 1 < self.depth(),
            None => false,
        }
    }

    /// This ref truncated to section granularity (one level above the
    /// finest grain). Already-coarse refs are returned unchanged.
    pub fn section_ref(&self) -> Ref {
        let keep = self.depth().min(self.section_depth());
        let mut out = self.clone();
        out.sections.truncate(keep);
        out.to_sections.truncate(keep);
        out
    }

    /// Drop the last address component from both sides.
    pub fn parent(&self) -> Option<Ref> {
        if self.sections.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.sections.pop();
        out.to_sections.pop();
        Some(out)
    }

    /// Append a finer address component to both sides.
    pub fn child(&self, component: impl Into<String>) -> Ref {
        let component = component.into();
        let mut out = self.clone();
        out.sections.push(component.clone());
        out.to_sections.push(component);
        out
    }

    /// The non-range ref at this ref's starting point.
    pub fn starting_ref(&self) -> Ref {
        let mut out = self.clone();
        out.to_sections = out.sections.clone();
        out
    }

    /// The non-range ref at this ref's end point.
    pub fn ending_ref(&self) -> Ref {
        let mut out = self.clone();
        out.sections = out.to_sections.clone();
        out
    }

    // ------------------------------------------------------------------------
    // Canonical forms
    // ------------------------------------------------------------------------

    /// Canonical URL form: `Book,_Node.1.3-2.5`.
    ///
    /// Spaces become underscores, non-default node titles get a `,_`
    /// prefix, and the range suffix repeats only the tail that actually
    /// changed, starting at the first differing index.
    pub fn normalize(&self) -> String {
        let mut out = build_url(&self.book, &self.node_path, &self.sections);
        if let Some(i) = self.first_diff_index() {
            out.push('-');
            out.push_str(&self.to_sections[i..].join("."));
        }
        out
    }

    /// Reader-facing display form: `Book, Node 1:3-2:5`.
    pub fn humanize(&self) -> String {
        let mut out = build_title(
            &self.book,
            &self.node_path,
            &self.address_types,
            &self.sections,
        );
        if let Some(i) = self.first_diff_index() {
            out.push('-');
            let tail: Vec<String> = self.to_sections[i..]
                .iter()
                .enumerate()
                .map(|(j, c)| match self.address_types.get(i + j) {
                    Some(at) => at.display(c),
                    None => c.clone(),
                })
                .collect();
            out.push_str(&tail.join(":"));
        }
        out
    }

    /// Percent-encoded canonical form for the browser boundary.
    pub fn to_encoded(&self) -> String {
        utf8_percent_encode(&self.normalize(), URL_KEEP).to_string()
    }

    // ------------------------------------------------------------------------
    // Arithmetic against a work
    // ------------------------------------------------------------------------

    /// The adjacent section-level ref in the given direction, or `None` at
    /// the corpus edge (or when shape data cannot bound the walk).
    pub fn adjacent_section(&self, work: &Work, direction: Direction) -> Option<Ref> {
        let base = self.section_ref();
        match self.section_depth() {
            // Depth-1 works: the whole node is one section; neighbors are
            // adjacent leaf nodes.
            0 => adjacent_leaf_ref(work, &base, direction),
            1 => {
                if base.depth() < 1 {
                    return None;
                }
                let at = *base.address_types.first()?;
                let ord = at.ordinal(&base.sections[0]).ok()?;
                let count = work.section_count_at(&base.node_path)?;
                let first = at.first_ordinal();
                match direction {
                    Direction::Next if ord + 1 < first + count => {
                        Some(base.with_section(at.from_ordinal(ord + 1)))
                    }
                    Direction::Prev if ord > first => {
                        Some(base.with_section(at.from_ordinal(ord - 1)))
                    }
                    _ => adjacent_leaf_ref(work, &base, direction),
                }
            }
            // Deeper section addressing has no bound in shape data; the
            // backend's next/prev hints cover these works.
            _ => None,
        }
    }

    /// Adjacent section toward the end of the work.
    pub fn next_section(&self, work: &Work) -> Option<Ref> {
        self.adjacent_section(work, Direction::Next)
    }

    /// Adjacent section toward the start of the work.
    pub fn prev_section(&self, work: &Work) -> Option<Ref> {
        self.adjacent_section(work, Direction::Prev)
    }

    fn with_section(&self, component: String) -> Ref {
        let mut out = self.clone();
        out.sections = SmallVec::new();
        out.sections.push(component);
        out.to_sections = out.sections.clone();
        out
    }

    /// Split a range crossing section boundaries into consecutive simple
    /// refs, one per section: the leading piece keeps its fine-grained
    /// start and closes at the end of its section (boundary taken from
    /// shape lengths), trailing pieces open at the section start.
    ///
    /// Refs that do not cross a section boundary come back unchanged.
    pub fn split_spanning(&self, work: &Work) -> Vec<Ref> {
        if self.first_diff_index() != Some(0) || self.depth() < 1 {
            return vec![self.clone()];
        }
        let Some(&at) = self.address_types.first() else {
            return vec![self.clone()];
        };
        let (Ok(start), Ok(end)) = (
            at.ordinal(&self.sections[0]),
            at.ordinal(&self.to_sections[0]),
        ) else {
            return vec![self.clone()];
        };
        if end <= start {
            return vec![self.clone()];
        }

        let lengths = work.lengths_at(&self.node_path);
        let first = at.first_ordinal();
        let mut out = Vec::with_capacity((end - start + 1) as usize);

        for ord in start..=end {
            let component = at.from_ordinal(ord);
            let piece = if ord == start {
                self.leading_piece(component, lengths, first, ord)
            } else if ord == end {
                self.trailing_piece(component)
            } else {
                self.with_section(component)
            };
            out.push(piece);
        }
        out
    }

    /// First piece of a split: from the original start point to the end of
    /// its section, when the boundary is known.
    fn leading_piece(
        &self,
        component: String,
        lengths: Option<&[u32]>,
        first: u32,
        ord: u32,
    ) -> Ref {
        if self.depth() < 2 {
            return self.with_section(component);
        }
        let boundary = lengths
            .and_then(|l| l.get((ord - first) as usize))
            .copied()
            .filter(|n| *n > 0);
        let Some(boundary) = boundary else {
            // End-of-section boundary unknown; degrade to the whole section.
            return self.with_section(component);
        };
        let Some(&leaf_at) = self.address_types.get(1) else {
            return self.with_section(component);
        };

        let mut piece = self.clone();
        piece.sections.truncate(2);
        piece.sections[0] = component;
        piece.to_sections = piece.sections.clone();
        piece.to_sections[1] = leaf_at.from_ordinal(leaf_at.first_ordinal() + boundary - 1);
        piece
    }

    /// Last piece of a split: from the section start to the original end
    /// point.
    fn trailing_piece(&self, component: String) -> Ref {
        if self.to_sections.len() < 2 {
            return self.with_section(component);
        }
        let Some(&leaf_at) = self.address_types.get(1) else {
            return self.with_section(component);
        };

        let mut piece = self.clone();
        piece.to_sections.truncate(2);
        piece.to_sections[0] = component;
        piece.sections = piece.to_sections.clone();
        piece.sections[1] = leaf_at.from_ordinal(leaf_at.first_ordinal());
        piece
    }

    /// 0-based index of the final leaf component, when this ref is at leaf
    /// depth (used to place the highlight within its section).
    pub fn leaf_index(&self) -> Option<u32> {
        if !self.is_leaf_depth() {
            return None;
        }
        let at = *self.address_types.last()?;
        let last = self.sections.last()?;
        let ord = at.ordinal(last).ok()?;
        Some(ord - at.first_ordinal())
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.humanize())
    }
}

/// First or last section of the leaf node adjacent to `base`'s node in
/// document order.
fn adjacent_leaf_ref(work: &Work, base: &Ref, direction: Direction) -> Option<Ref> {
    let paths = work.leaf_paths();
    let position = paths.iter().position(|p| p.as_slice() == base.node_path.as_slice())?;
    let target = match direction {
        Direction::Next => paths.get(position + 1)?,
        Direction::Prev => {
            if position == 0 {
                return None;
            }
            paths.get(position - 1)?
        }
    };

    let address_types = work.address_types_at(target)?;
    let mut out = Ref {
        book: base.book.clone(),
        node_path: target.clone(),
        address_types: address_types.iter().copied().collect(),
        sections: SmallVec::new(),
        to_sections: SmallVec::new(),
    };
    if address_types.len() < 2 {
        // Depth-1 leaf: the node itself is the section.
        return Some(out);
    }

    let at = address_types[0];
    let count = work.section_count_at(target)?;
    if count == 0 {
        return None;
    }
    let ordinal = match direction {
        Direction::Next => at.first_ordinal(),
        Direction::Prev => at.first_ordinal() + count - 1,
    };
    out.sections.push(at.from_ordinal(ordinal));
    out.to_sections = out.sections.clone();
    Some(out)
}
