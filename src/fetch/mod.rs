//! Backend text-fetch contract.
//!
//! The core consumes two endpoints: text payloads for a normalized ref
//! (plus an optional version selector) and structural descriptions for a
//! work title. Both arrive as JSON shaped like the structures here; the
//! crate never talks to a network itself - the embedding application
//! supplies a [`TextFetcher`].
//!
//! Fetches are asynchronous and non-cancellable; callers ignore late
//! results rather than aborting them.

use crate::core::FetchError;
use crate::schema::SchemaNode;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ============================================================================
// TextFetcher
// ============================================================================

/// Capability to fetch text and structure from the backend.
pub trait TextFetcher: Send + Sync + 'static {
    /// Fetch the text payload for a normalized ref.
    ///
    /// A `version` narrows the fetch to one edition; `None` requests the
    /// backend default.
    fn fetch_text(
        &self,
        tref: &str,
        version: Option<&VersionSelector>,
    ) -> impl Future<Output = Result<TextPayload, FetchError>> + Send;

    /// Fetch the structural description of a work.
    fn fetch_shape(&self, title: &str) -> impl Future<Output = Result<ShapePayload, FetchError>> + Send;
}

// ============================================================================
// Payload types
// ============================================================================

/// Selects one edition of a work's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSelector {
    pub language: String,
    pub version_title: String,
}

impl VersionSelector {
    pub fn new(language: impl Into<String>, version_title: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            version_title: version_title.into(),
        }
    }
}

/// Text content nested to `text_depth`: a section holds segments, a
/// chapter-run holds sections, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextContent {
    Segment(String),
    Sections(Vec<TextContent>),
}

impl TextContent {
    /// Number of entries at the top level (a bare segment counts as one).
    pub fn segment_count(&self) -> usize {
        match self {
            TextContent::Segment(_) => 1,
            TextContent::Sections(items) => items.len(),
        }
    }

    /// Nesting depth: 0 for a bare segment, 1 for a list of segments, ...
    pub fn depth(&self) -> usize {
        match self {
            TextContent::Segment(_) => 0,
            TextContent::Sections(items) => {
                1 + items.iter().map(TextContent::depth).max().unwrap_or(0)
            }
        }
    }

    /// Entry at a 0-based top-level index.
    pub fn at(&self, index: usize) -> Option<&TextContent> {
        match self {
            TextContent::Segment(_) => None,
            TextContent::Sections(items) => items.get(index),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TextContent::Segment(s) => s.is_empty(),
            TextContent::Sections(items) => items.is_empty(),
        }
    }
}

impl Default for TextContent {
    fn default() -> Self {
        TextContent::Sections(Vec::new())
    }
}

/// One fetched text response.
///
/// `sections`/`to_sections` address the payload the same way a [`Ref`]
/// does; `text` is nested to `text_depth` below that address.
///
/// [`Ref`]: crate::refs::Ref
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPayload {
    #[serde(rename = "ref")]
    pub tref: String,

    /// Ref of the enclosing section (one level above the finest grain).
    pub section_ref: String,

    pub sections: SmallVec<[String; 4]>,
    pub to_sections: SmallVec<[String; 4]>,

    pub text_depth: u8,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub is_spanning: bool,

    /// Constituent simple refs when `is_spanning` (normalized forms).
    #[serde(default)]
    pub spanning_refs: Vec<String>,

    /// Adjacent section refs, when the backend knows them.
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub prev: Option<String>,

    #[serde(default)]
    pub text: TextContent,

    /// Which edition this payload came from.
    #[serde(default)]
    pub version: Option<VersionSelector>,
}

/// Structural description of a work, fetched once per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePayload {
    pub title: String,

    #[serde(default)]
    pub categories: Vec<String>,

    /// Schema tree with per-section content-presence counts.
    pub schema: SchemaNode,
}
