//! Title-path resolution over a schema tree.
//!
//! Walks a sequence of human titles down the tree. When the next title is
//! not a literal child but the current node has a default child, resolution
//! descends into the default child and the unmatched title becomes the
//! first section address instead of a structural title. This is what lets
//! a flat-looking locator like `Work 4:5` address a work with a single
//! default sub-structure while named sub-works stay explicitly addressable.

use super::SchemaNode;
use smallvec::SmallVec;

/// Outcome of walking titles down a schema tree.
#[derive(Debug)]
pub struct Resolution<'a> {
    /// The node resolution stopped at.
    pub node: &'a SchemaNode,
    /// Non-default titles traversed (the node-path that appears in URLs).
    pub node_path: SmallVec<[String; 2]>,
    /// Titles not consumed; the caller treats these as address components.
    pub remaining: Vec<String>,
    /// Whether a default child was entered along the way.
    pub used_default: bool,
}

/// Resolve a title sequence against a schema tree.
///
/// Resolving past a leaf node returns the leaf with the unconsumed tail in
/// `remaining` - a recoverable condition used by the reference parser, not
/// an error.
pub fn resolve<'a>(root: &'a SchemaNode, titles: &[String]) -> Resolution<'a> {
    let mut node = root;
    let mut node_path: SmallVec<[String; 2]> = SmallVec::new();
    let mut used_default = false;
    let mut index = 0;

    while !node.is_leaf() {
        match titles.get(index) {
            Some(title) => {
                if let Some(child) = node.child_by_title(title) {
                    if !child.is_default {
                        node_path.push(child.title.clone());
                    }
                    node = child;
                    index += 1;
                } else if let Some(default) = node.default_child() {
                    // Unmatched title: fall into the default child and stop
                    // consuming titles - the rest are section addresses.
                    node = default;
                    used_default = true;
                } else {
                    break;
                }
            }
            None => {
                // No titles left; descend through defaults to the
                // addressable node.
                let Some(default) = node.default_child() else {
                    break;
                };
                node = default;
                used_default = true;
            }
        }
    }

    Resolution {
        node,
        node_path,
        remaining: titles[index..].to_vec(),
        used_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AddressType;

    fn leaf(title: &str, default: bool) -> SchemaNode {
        SchemaNode {
            title: title.to_string(),
            children: Vec::new(),
            address_types: vec![AddressType::Integer, AddressType::Integer],
            is_default: default,
            lengths: vec![5, 5],
        }
    }

    fn root_with_default() -> SchemaNode {
        SchemaNode {
            title: "Work".to_string(),
            children: vec![leaf("", true), leaf("Introduction", false)],
            address_types: Vec::new(),
            is_default: false,
            lengths: Vec::new(),
        }
    }

    #[test]
    fn test_default_child_absorbs_section_address() {
        let root = root_with_default();
        let res = resolve(&root, &["5".to_string()]);
        assert!(res.used_default);
        assert!(res.node.is_default);
        assert!(res.node_path.is_empty());
        assert_eq!(res.remaining, vec!["5".to_string()]);
    }

    #[test]
    fn test_named_child_consumed_as_title() {
        let root = root_with_default();
        let res = resolve(&root, &["Introduction".to_string(), "3".to_string()]);
        assert!(!res.used_default);
        assert_eq!(res.node.title, "Introduction");
        assert_eq!(res.node_path.as_slice(), ["Introduction".to_string()]);
        assert_eq!(res.remaining, vec!["3".to_string()]);
    }

    #[test]
    fn test_empty_titles_descend_defaults() {
        let root = root_with_default();
        let res = resolve(&root, &[]);
        assert!(res.used_default);
        assert!(res.node.is_leaf());
        assert!(res.remaining.is_empty());
    }

    #[test]
    fn test_resolving_past_leaf_is_recoverable() {
        let node = leaf("Flat", false);
        let res = resolve(&node, &["2".to_string(), "7".to_string()]);
        assert_eq!(res.node.title, "Flat");
        assert_eq!(res.remaining.len(), 2);
    }

    #[test]
    fn test_no_default_no_match_stops_at_node() {
        let root = SchemaNode {
            title: "Work".to_string(),
            children: vec![leaf("Part One", false), leaf("Part Two", false)],
            address_types: Vec::new(),
            is_default: false,
            lengths: Vec::new(),
        };
        let res = resolve(&root, &["5".to_string()]);
        assert!(!res.used_default);
        assert_eq!(res.node.title, "Work");
        assert_eq!(res.remaining, vec!["5".to_string()]);
    }
}
