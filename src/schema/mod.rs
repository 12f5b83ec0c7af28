//! Structural descriptors for works in the corpus.
//!
//! A work is either *uniform* (a flat run of sections addressed the same
//! way at every depth, e.g. chapter/verse) or *tree-shaped* (named
//! sub-nodes with their own addressing, e.g. a commentary with an
//! introduction and per-chapter notes). The two shapes are a tagged union
//! so resolution and URL building match exhaustively instead of probing
//! for children at runtime.
//!
//! Structural descriptions are fetched once per work per session and are
//! immutable afterwards.

mod resolve;

pub use resolve::{Resolution, resolve};

use crate::core::DecodeError;
use crate::numeral::{Folio, hebrew};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ============================================================================
// AddressType
// ============================================================================

/// How one depth of a work is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    /// Plain 1-based integers ("5").
    Integer,
    /// Two-sided folio addresses ("21a"), linearized 0-based.
    Talmud,
    /// Alphabetic numerals; canonical form is the decimal value.
    Letter,
}

impl AddressType {
    /// First valid ordinal at this address type.
    pub fn first_ordinal(self) -> u32 {
        match self {
            AddressType::Talmud => 0,
            AddressType::Integer | AddressType::Letter => 1,
        }
    }

    /// Canonical storage form of a component.
    ///
    /// Integers and letters canonicalize to decimal strings, folios to
    /// `"21a"` form (bare folio numbers read as side `a`).
    pub fn canonical(self, component: &str) -> Result<String, DecodeError> {
        match self {
            AddressType::Integer => {
                let n = parse_positive(component)?;
                Ok(n.to_string())
            }
            AddressType::Talmud => {
                let folio: Folio = component.parse()?;
                Ok(folio.to_string())
            }
            AddressType::Letter => {
                if component.chars().all(|c| c.is_ascii_digit()) {
                    let n = parse_positive(component)?;
                    Ok(n.to_string())
                } else {
                    Ok(hebrew::decode(component)?.to_string())
                }
            }
        }
    }

    /// Whether a component is valid at this address type.
    pub fn validate(self, component: &str) -> bool {
        self.canonical(component).is_ok()
    }

    /// Ordinal of a canonical component (1-based for Integer/Letter,
    /// 0-based linear for Talmud).
    pub fn ordinal(self, component: &str) -> Result<u32, DecodeError> {
        match self {
            AddressType::Integer | AddressType::Letter => {
                parse_positive(&self.canonical(component)?)
            }
            AddressType::Talmud => {
                let folio: Folio = component.parse()?;
                Ok(folio.to_linear())
            }
        }
    }

    /// Canonical component for an ordinal.
    pub fn from_ordinal(self, ordinal: u32) -> String {
        match self {
            AddressType::Integer | AddressType::Letter => ordinal.to_string(),
            AddressType::Talmud => Folio::from_linear(ordinal).to_string(),
        }
    }

    /// Reader-facing display form of a canonical component.
    pub fn display(self, component: &str) -> String {
        match self {
            AddressType::Letter => component
                .parse::<u32>()
                .ok()
                .and_then(|n| hebrew::encode(n).ok())
                .unwrap_or_else(|| component.to_string()),
            AddressType::Integer | AddressType::Talmud => component.to_string(),
        }
    }
}

fn parse_positive(s: &str) -> Result<u32, DecodeError> {
    match s.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DecodeError::BadNumber(s.to_string())),
    }
}

// ============================================================================
// SchemaNode
// ============================================================================

/// Recursive structural descriptor for one work.
///
/// Invariants (checked by [`SchemaNode::validate`]):
/// - at most one child of a parent is marked default
/// - leaf nodes carry at least one address type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub title: String,

    #[serde(default)]
    pub children: Vec<SchemaNode>,

    /// One address type per depth below this node (leaf nodes only).
    #[serde(default)]
    pub address_types: Vec<AddressType>,

    /// Default children are elided from the canonical URL form.
    #[serde(default, alias = "default")]
    pub is_default: bool,

    /// Per-section content-presence counts from the structural fetch:
    /// `lengths.len()` is the section count, `lengths[i]` the number of
    /// segments in section `i + 1` (leaf nodes only).
    #[serde(default)]
    pub lengths: Vec<u32>,
}

impl SchemaNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Find a child by its literal title.
    pub fn child_by_title(&self, title: &str) -> Option<&SchemaNode> {
        self.children.iter().find(|c| c.title == title)
    }

    /// The default child, if one is marked.
    pub fn default_child(&self) -> Option<&SchemaNode> {
        self.children.iter().find(|c| c.is_default)
    }

    /// Check structural invariants recursively.
    pub fn validate(&self) -> Result<(), String> {
        let defaults = self.children.iter().filter(|c| c.is_default).count();
        if defaults > 1 {
            return Err(format!("node `{}` has {defaults} default children", self.title));
        }
        if self.is_leaf() && self.address_types.is_empty() {
            return Err(format!("leaf node `{}` has no address types", self.title));
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }

    /// Leaf nodes in document order, each with the node-path of
    /// *non-default* titles leading to it (the path that appears in URLs).
    pub fn leaves(&self) -> Vec<(SmallVec<[String; 2]>, &SchemaNode)> {
        let mut out = Vec::new();
        self.collect_leaves(&SmallVec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        path: &SmallVec<[String; 2]>,
        out: &mut Vec<(SmallVec<[String; 2]>, &'a SchemaNode)>,
    ) {
        if self.is_leaf() {
            out.push((path.clone(), self));
            return;
        }
        for child in &self.children {
            let mut child_path = path.clone();
            if !child.is_default {
                child_path.push(child.title.clone());
            }
            child.collect_leaves(&child_path, out);
        }
    }

    /// Descend a node-path of non-default titles (as produced by
    /// [`SchemaNode::leaves`]), skipping through default children.
    pub fn node_at(&self, path: &[String]) -> Option<&SchemaNode> {
        let mut node = self;
        let mut remaining = path;
        loop {
            if remaining.is_empty() {
                // Descend through defaults down to the addressable node
                while let Some(default) = node.default_child() {
                    node = default;
                }
                return Some(node);
            }
            if let Some(child) = node.child_by_title(&remaining[0]) {
                node = child;
                remaining = &remaining[1..];
            } else if let Some(default) = node.default_child() {
                node = default;
            } else {
                return None;
            }
        }
    }
}

// ============================================================================
// Work
// ============================================================================

/// Structural scheme of a work: uniform depth or a tree of named nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scheme {
    /// Linear structure with the same addressing at every depth.
    #[serde(rename_all = "camelCase")]
    Uniform {
        address_types: Vec<AddressType>,
        /// Per-section segment counts (see [`SchemaNode::lengths`]).
        #[serde(default)]
        lengths: Vec<u32>,
    },
    /// Tree of named sub-nodes with mixed addressing.
    Tree { root: SchemaNode },
}

/// An addressable work in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    /// Canonical work title.
    pub title: String,
    pub scheme: Scheme,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Work {
    pub fn uniform(title: impl Into<String>, address_types: Vec<AddressType>) -> Self {
        Self {
            title: title.into(),
            scheme: Scheme::Uniform {
                address_types,
                lengths: Vec::new(),
            },
            categories: Vec::new(),
        }
    }

    pub fn with_lengths(mut self, lengths: Vec<u32>) -> Self {
        if let Scheme::Uniform { lengths: l, .. } = &mut self.scheme {
            *l = lengths;
        }
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn tree(title: impl Into<String>, root: SchemaNode) -> Self {
        Self {
            title: title.into(),
            scheme: Scheme::Tree { root },
            categories: Vec::new(),
        }
    }

    /// Address types at the node identified by a non-default node-path.
    pub fn address_types_at(&self, node_path: &[String]) -> Option<&[AddressType]> {
        match &self.scheme {
            Scheme::Uniform { address_types, .. } => {
                node_path.is_empty().then_some(address_types.as_slice())
            }
            Scheme::Tree { root } => root
                .node_at(node_path)
                .map(|node| node.address_types.as_slice()),
        }
    }

    /// Per-section segment counts at a node-path.
    pub fn lengths_at(&self, node_path: &[String]) -> Option<&[u32]> {
        match &self.scheme {
            Scheme::Uniform { lengths, .. } => {
                node_path.is_empty().then_some(lengths.as_slice())
            }
            Scheme::Tree { root } => root.node_at(node_path).map(|node| node.lengths.as_slice()),
        }
    }

    /// Number of sections at a node-path (chapter-equivalent count).
    pub fn section_count_at(&self, node_path: &[String]) -> Option<u32> {
        self.lengths_at(node_path).map(|l| l.len() as u32)
    }

    /// Leaf node-paths in document order (a uniform work has one, empty).
    pub fn leaf_paths(&self) -> Vec<SmallVec<[String; 2]>> {
        match &self.scheme {
            Scheme::Uniform { .. } => vec![SmallVec::new()],
            Scheme::Tree { root } => root.leaves().into_iter().map(|(path, _)| path).collect(),
        }
    }

    /// Validate the scheme's structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        match &self.scheme {
            Scheme::Uniform { address_types, .. } => {
                if address_types.is_empty() {
                    return Err(format!("uniform work `{}` has no address types", self.title));
                }
                Ok(())
            }
            Scheme::Tree { root } => root.validate(),
        }
    }
}

// ============================================================================
// URL / title builders
// ============================================================================

/// Canonical URL form: `Book,_Node.1.2` - spaces become underscores,
/// non-default node titles are rendered with a `,_` prefix, address
/// components join with `.`. Default children never appear.
pub fn build_url(title: &str, node_path: &[String], components: &[String]) -> String {
    let mut out = title.replace(' ', "_");
    for node in node_path {
        out.push_str(",_");
        out.push_str(&node.replace(' ', "_"));
    }
    for component in components {
        out.push('.');
        out.push_str(component);
    }
    out
}

/// Reader-facing display form: `Book, Node 1:2`.
pub fn build_title(
    title: &str,
    node_path: &[String],
    address_types: &[AddressType],
    components: &[String],
) -> String {
    let mut out = title.to_string();
    for node in node_path {
        out.push_str(", ");
        out.push_str(node);
    }
    if !components.is_empty() {
        out.push(' ');
        let rendered: Vec<String> = components
            .iter()
            .enumerate()
            .map(|(i, c)| match address_types.get(i) {
                Some(at) => at.display(c),
                None => c.clone(),
            })
            .collect();
        out.push_str(&rendered.join(":"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_node(title: &str, default: bool) -> SchemaNode {
        SchemaNode {
            title: title.to_string(),
            children: Vec::new(),
            address_types: vec![AddressType::Integer, AddressType::Integer],
            is_default: default,
            lengths: vec![10, 12, 8],
        }
    }

    #[test]
    fn test_address_type_integer() {
        assert_eq!(AddressType::Integer.canonical("5").unwrap(), "5");
        assert!(AddressType::Integer.canonical("0").is_err());
        assert!(AddressType::Integer.canonical("x").is_err());
        assert_eq!(AddressType::Integer.ordinal("5").unwrap(), 5);
        assert_eq!(AddressType::Integer.from_ordinal(5), "5");
    }

    #[test]
    fn test_address_type_talmud() {
        assert_eq!(AddressType::Talmud.canonical("21a").unwrap(), "21a");
        assert_eq!(AddressType::Talmud.canonical("21").unwrap(), "21a");
        assert_eq!(AddressType::Talmud.ordinal("21a").unwrap(), 40);
        assert_eq!(AddressType::Talmud.from_ordinal(41), "21b");
        assert!(AddressType::Talmud.canonical("21c").is_err());
    }

    #[test]
    fn test_address_type_letter() {
        assert_eq!(AddressType::Letter.canonical("ה").unwrap(), "5");
        assert_eq!(AddressType::Letter.canonical("5").unwrap(), "5");
        assert_eq!(AddressType::Letter.display("5"), "ה");
        assert_eq!(AddressType::Letter.ordinal("טו").unwrap(), 15);
    }

    #[test]
    fn test_node_validate_rejects_two_defaults() {
        let node = SchemaNode {
            title: "Root".to_string(),
            children: vec![two_level_node("A", true), two_level_node("B", true)],
            address_types: Vec::new(),
            is_default: false,
            lengths: Vec::new(),
        };
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_leaves_skip_default_titles() {
        let root = SchemaNode {
            title: "Root".to_string(),
            children: vec![two_level_node("Base Text", true), two_level_node("Notes", false)],
            address_types: Vec::new(),
            is_default: false,
            lengths: Vec::new(),
        };
        let leaves = root.leaves();
        assert_eq!(leaves.len(), 2);
        assert!(leaves[0].0.is_empty());
        assert_eq!(leaves[1].0.as_slice(), ["Notes".to_string()]);
    }

    #[test]
    fn test_node_at_descends_defaults() {
        let root = SchemaNode {
            title: "Root".to_string(),
            children: vec![two_level_node("Base Text", true), two_level_node("Notes", false)],
            address_types: Vec::new(),
            is_default: false,
            lengths: Vec::new(),
        };
        let node = root.node_at(&[]).unwrap();
        assert_eq!(node.title, "Base Text");
        let node = root.node_at(&["Notes".to_string()]).unwrap();
        assert_eq!(node.title, "Notes");
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url("Song of Songs", &[], &["1".into(), "4".into()]),
            "Song_of_Songs.1.4"
        );
        assert_eq!(
            build_url("Orot", &["Lights from Darkness".to_string()], &["2".into()]),
            "Orot,_Lights_from_Darkness.2"
        );
    }

    #[test]
    fn test_build_title() {
        let types = [AddressType::Talmud, AddressType::Integer];
        assert_eq!(
            build_title("Shabbat", &[], &types, &["21a".into(), "5".into()]),
            "Shabbat 21a:5"
        );
    }

    #[test]
    fn test_schema_node_deserializes_wire_form() {
        let json = r#"{
            "title": "Orot",
            "children": [
                {"title": "", "default": true, "addressTypes": ["Integer", "Integer"], "lengths": [3, 4]},
                {"title": "Lights from Darkness", "addressTypes": ["Integer"], "lengths": [9]}
            ]
        }"#;
        let node: SchemaNode = serde_json::from_str(json).unwrap();
        assert!(node.children[0].is_default);
        assert_eq!(node.children[1].address_types, vec![AddressType::Integer]);
        assert!(node.validate().is_ok());
    }
}
