//! Registry of known works and their titles.
//!
//! The single source of truth for locator resolution: every registered
//! work contributes its canonical title plus one index entry per named
//! (non-default) node path, so the parser's greedy-longest prefix scan can
//! land directly on `"Book, Node"` compounds. Commentary-style dual titles
//! (`"A on B"`) are ordinary works whose titles happen to contain `on`.
//!
//! Construct one per session and share it; nothing here is global.

use super::parse::parse_in;
use super::Ref;
use crate::core::{FetchError, RefError};
use crate::fetch::{ShapePayload, TextFetcher};
use crate::schema::{Scheme, SchemaNode, Work};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Index entry: which work a title string belongs to, and the node-path
/// inside it.
#[derive(Debug, Clone)]
pub(crate) struct TitleEntry {
    pub work: String,
    pub node_path: SmallVec<[String; 2]>,
}

/// Registry of works, title index and parse memo.
#[derive(Debug, Default)]
pub struct Library {
    /// Canonical title -> work.
    works: FxHashMap<String, Arc<Work>>,
    /// Normalized title key -> entry.
    title_index: FxHashMap<String, TitleEntry>,
    /// Raw input -> parse result. Parsing is pure and repeatedly invoked
    /// on the same strings during scroll and navigation.
    memo: DashMap<String, Result<Ref, RefError>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a work, indexing its title and every named node path.
    ///
    /// Re-registering a title replaces the previous entry.
    pub fn register(&mut self, work: Work) -> Result<(), String> {
        work.validate()?;

        let title = work.title.clone();
        self.title_index.insert(
            title_key(&title),
            TitleEntry {
                work: title.clone(),
                node_path: SmallVec::new(),
            },
        );

        if let Scheme::Tree { root } = &work.scheme {
            let mut paths = Vec::new();
            collect_named_paths(root, &SmallVec::new(), &mut paths);
            for path in paths {
                let mut compound = title.clone();
                for segment in &path {
                    compound.push_str(", ");
                    compound.push_str(segment);
                }
                self.title_index.insert(
                    title_key(&compound),
                    TitleEntry {
                        work: title.clone(),
                        node_path: path,
                    },
                );
            }
        }

        self.works.insert(title, Arc::new(work));
        // New titles can change the longest-prefix match for old inputs
        self.memo.clear();
        Ok(())
    }

    /// Fetch a work's structural description and register it.
    ///
    /// Shapes are fetched once per work per session; a second call for a
    /// registered title is served from the registry.
    pub async fn load_shape<F: TextFetcher>(
        &mut self,
        title: &str,
        fetcher: &F,
    ) -> Result<Arc<Work>, FetchError> {
        if let Some(work) = self.work(title) {
            return Ok(work);
        }
        let shape = fetcher.fetch_shape(title).await?;
        let work = shape.into_work();
        let canonical = work.title.clone();
        self.register(work)
            .map_err(|e| FetchError::payload(title, e))?;
        self.work(&canonical)
            .ok_or_else(|| FetchError::payload(title, "registration lost"))
    }

    /// Look up a registered work by canonical title.
    pub fn work(&self, title: &str) -> Option<Arc<Work>> {
        self.works.get(title).cloned()
    }

    /// The work a ref belongs to.
    pub fn work_of(&self, r: &Ref) -> Option<Arc<Work>> {
        self.work(&r.book)
    }

    pub fn is_registered(&self, title: &str) -> bool {
        self.works.contains_key(title)
    }

    pub(crate) fn title_entry(&self, title: &str) -> Option<&TitleEntry> {
        self.title_index.get(&title_key(title))
    }

    /// Parse a locator string, memoized by raw input.
    pub fn parse(&self, raw: &str) -> Result<Ref, RefError> {
        if let Some(hit) = self.memo.get(raw) {
            return hit.clone();
        }
        let result = parse_in(self, raw);
        self.memo.insert(raw.to_string(), result.clone());
        result
    }

    /// Number of memoized parse results (test observability).
    #[cfg(test)]
    pub(crate) fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

impl ShapePayload {
    /// Convert a structural-description payload into a [`Work`]: a schema
    /// root without children is a uniform work, anything else is a tree.
    pub fn into_work(self) -> Work {
        let work = if self.schema.is_leaf() {
            Work::uniform(self.title, self.schema.address_types.clone())
                .with_lengths(self.schema.lengths.clone())
        } else {
            Work::tree(self.title, self.schema)
        };
        work.with_categories(self.categories)
    }
}

/// Normalized index key: lowercase, single-spaced.
fn title_key(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Every node-path of named (non-default) nodes, including intermediate
/// ones - a locator may point at a non-leaf node.
fn collect_named_paths(
    node: &SchemaNode,
    path: &SmallVec<[String; 2]>,
    out: &mut Vec<SmallVec<[String; 2]>>,
) {
    for child in &node.children {
        if child.is_default {
            collect_named_paths(child, path, out);
            continue;
        }
        let mut child_path = path.clone();
        child_path.push(child.title.clone());
        out.push(child_path.clone());
        collect_named_paths(child, &child_path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AddressType;

    fn leaf(title: &str, default: bool, lengths: Vec<u32>) -> SchemaNode {
        SchemaNode {
            title: title.to_string(),
            children: Vec::new(),
            address_types: vec![AddressType::Integer, AddressType::Integer],
            is_default: default,
            lengths,
        }
    }

    fn library() -> Library {
        let mut lib = Library::new();
        lib.register(
            Work::uniform("Genesis", vec![AddressType::Integer, AddressType::Integer])
                .with_lengths(vec![31, 25, 24]),
        )
        .unwrap();
        lib.register(
            Work::uniform(
                "Rashi on Genesis",
                vec![
                    AddressType::Integer,
                    AddressType::Integer,
                    AddressType::Integer,
                ],
            ),
        )
        .unwrap();
        lib.register(
            Work::uniform("Shabbat", vec![AddressType::Talmud, AddressType::Integer])
                .with_lengths(vec![8; 60]),
        )
        .unwrap();
        lib.register(Work::tree(
            "Orot",
            SchemaNode {
                title: "Orot".to_string(),
                children: vec![
                    leaf("", true, vec![6, 6]),
                    leaf("Lights from Darkness", false, vec![9, 9]),
                ],
                address_types: Vec::new(),
                is_default: false,
                lengths: Vec::new(),
            },
        ))
        .unwrap();
        lib
    }

    #[test]
    fn test_parse_simple() {
        let lib = library();
        let r = lib.parse("Genesis 1:1").unwrap();
        assert_eq!(r.book, "Genesis");
        assert_eq!(r.sections.as_slice(), ["1".to_string(), "1".to_string()]);
        assert_eq!(r.to_sections, r.sections);
    }

    #[test]
    fn test_parse_url_form() {
        let lib = library();
        let r = lib.parse("Genesis.1.3-2.5").unwrap();
        assert_eq!(r.sections.as_slice(), ["1".to_string(), "3".to_string()]);
        assert_eq!(r.to_sections.as_slice(), ["2".to_string(), "5".to_string()]);
        assert!(r.is_spanning());
    }

    #[test]
    fn test_parse_range_overlay_pads_from_right() {
        let lib = library();
        let r = lib.parse("Genesis 1:3-5").unwrap();
        assert_eq!(r.sections.as_slice(), ["1".to_string(), "3".to_string()]);
        assert_eq!(r.to_sections.as_slice(), ["1".to_string(), "5".to_string()]);
        assert!(!r.is_spanning());
    }

    #[test]
    fn test_greedy_longest_title_wins() {
        let lib = library();
        // "Genesis" is a prefix of "Rashi on Genesis"'s tail, and both are
        // registered; the full remaining string must be tried first.
        let r = lib.parse("Rashi on Genesis 1:1:2").unwrap();
        assert_eq!(r.book, "Rashi on Genesis");
        assert_eq!(r.depth(), 3);
    }

    #[test]
    fn test_parse_talmud_folio() {
        let lib = library();
        let r = lib.parse("Shabbat 21a:5").unwrap();
        assert_eq!(r.sections.as_slice(), ["21a".to_string(), "5".to_string()]);
        assert_eq!(r.normalize(), "Shabbat.21a.5");
    }

    #[test]
    fn test_parse_default_child_section_address() {
        let lib = library();
        let r = lib.parse("Orot 5").unwrap();
        assert!(r.node_path.is_empty());
        assert_eq!(r.sections.as_slice(), ["5".to_string()]);
    }

    #[test]
    fn test_parse_named_node_path() {
        let lib = library();
        let r = lib.parse("Orot, Lights from Darkness 2:3").unwrap();
        assert_eq!(r.node_path.as_slice(), ["Lights from Darkness".to_string()]);
        assert_eq!(r.normalize(), "Orot,_Lights_from_Darkness.2.3");
    }

    #[test]
    fn test_parse_named_node_url_form() {
        let lib = library();
        let r = lib.parse("Orot,_Lights_from_Darkness.2.3").unwrap();
        assert_eq!(r.node_path.as_slice(), ["Lights from Darkness".to_string()]);
        assert_eq!(r.humanize(), "Orot, Lights from Darkness 2:3");
    }

    #[test]
    fn test_parse_unknown_book() {
        let lib = library();
        assert!(matches!(
            lib.parse("Nonexistent 1:1"),
            Err(RefError::UnknownBook(_))
        ));
    }

    #[test]
    fn test_parse_bad_section_string() {
        let lib = library();
        assert!(matches!(
            lib.parse("Genesis 1:x"),
            Err(RefError::BadSectionString { .. })
        ));
        assert!(matches!(
            lib.parse("Genesis 1:1:1"),
            Err(RefError::BadSectionString { .. })
        ));
        assert!(matches!(
            lib.parse("Genesis 1-2-3"),
            Err(RefError::BadSectionString { .. })
        ));
    }

    #[test]
    fn test_parse_book_only() {
        let lib = library();
        let r = lib.parse("Genesis").unwrap();
        assert!(r.sections.is_empty());
        assert_eq!(r.normalize(), "Genesis");
    }

    #[test]
    fn test_parse_is_memoized() {
        let lib = library();
        assert_eq!(lib.memo_len(), 0);
        lib.parse("Genesis 1:1").unwrap();
        lib.parse("Genesis 1:1").unwrap();
        assert_eq!(lib.memo_len(), 1);
    }

    #[test]
    fn test_parse_error_is_memoized_not_cached_as_ref() {
        let lib = library();
        assert!(lib.parse("Genesis 1:x").is_err());
        assert!(lib.parse("Genesis 1:x").is_err());
        assert_eq!(lib.memo_len(), 1);
    }

    #[test]
    fn test_normalize_idempotent() {
        let lib = library();
        for raw in [
            "Genesis 1:3-5",
            "Genesis.1.3-2.5",
            "Shabbat 21a:5",
            "Orot 5",
            "Orot, Lights from Darkness 2:3-7",
        ] {
            let once = lib.parse(raw).unwrap().normalize();
            let twice = lib.parse(&once).unwrap().normalize();
            assert_eq!(once, twice, "normalize not idempotent for `{raw}`");
        }
    }

    #[test]
    fn test_humanize_round_trip() {
        let lib = library();
        for raw in ["Genesis 1:3-5", "Shabbat 21a:5", "Orot, Lights from Darkness 2:3"] {
            let parsed = lib.parse(raw).unwrap();
            let normalized = parsed.normalize();
            let reparsed = lib.parse(&normalized).unwrap();
            assert_eq!(reparsed.humanize(), parsed.humanize());
        }
    }

    #[test]
    fn test_case_insensitive_titles() {
        let lib = library();
        let r = lib.parse("genesis 1:1").unwrap();
        assert_eq!(r.book, "Genesis");
    }
}
