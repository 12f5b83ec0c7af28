//! Locator string parsing.
//!
//! Strategy: fold the URL form back to the human form (underscores to
//! spaces), then scan successively shorter prefixes of the input - longest
//! first - for a known title. Greedy-longest matching is mandatory, not an
//! optimization: many titles are prefixes of other titles' "on"-compounds
//! and node paths. The remainder is then validated as address components
//! against the resolved node's address types, with at most one `-` range
//! separator whose suffix overlays the end side from the right.

use super::library::Library;
use super::Ref;
use crate::core::RefError;
use crate::schema::{AddressType, Scheme, SchemaNode, resolve};
use regex::Regex;
use smallvec::SmallVec;
use std::sync::LazyLock;

/// Address components separate on `:`, `.` or whitespace.
static COMPONENT_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    // Infallible: the pattern is a literal
    Regex::new(r"[\s:.]+").expect("component split pattern")
});

/// Parse a raw locator string against the library's registered works.
pub(crate) fn parse_in(library: &Library, raw: &str) -> Result<Ref, RefError> {
    let cleaned = raw.trim().replace('_', " ");
    if cleaned.is_empty() {
        return Err(RefError::UnknownBook(raw.to_string()));
    }

    let Some((entry, remainder)) = match_title(library, &cleaned) else {
        return Err(RefError::UnknownBook(raw.to_string()));
    };

    let work = library
        .work(&entry.work)
        .ok_or_else(|| RefError::UnknownBook(raw.to_string()))?;

    let remainder = remainder.trim_start_matches(['.', ' ']).trim();
    let (start_raw, end_raw) = split_range(&cleaned, remainder)?;

    let start_tokens = tokenize(start_raw);
    match &work.scheme {
        Scheme::Uniform { address_types, .. } => build_ref(
            &cleaned,
            work.title.clone(),
            entry.node_path.clone(),
            address_types,
            &start_tokens,
            end_raw,
        ),
        Scheme::Tree { root } => {
            // Feed the node-path titles and the remaining tokens back
            // through schema resolution so the default-child rule applies:
            // an unmatched token at a node with a default child becomes the
            // first section address.
            let mut titles: Vec<String> = entry.node_path.iter().cloned().collect();
            titles.extend(start_tokens.iter().cloned());
            let resolution = resolve(root, &titles);
            if !resolution.node.is_leaf() && !resolution.remaining.is_empty() {
                return Err(RefError::bad_section(
                    cleaned.clone(),
                    format!(
                        "`{}` is not addressable under `{}`",
                        resolution.remaining.join(" "),
                        resolution.node.title
                    ),
                ));
            }
            build_ref(
                &cleaned,
                work.title.clone(),
                resolution.node_path,
                node_types(resolution.node),
                &resolution.remaining,
                end_raw,
            )
        }
    }
}

fn node_types(node: &SchemaNode) -> &[AddressType] {
    node.address_types.as_slice()
}

/// Greedy-longest title prefix match.
///
/// Tries the full string first, then every shorter prefix ending at a
/// separator, stopping at the first hit.
fn match_title<'a, 'b>(
    library: &'a Library,
    cleaned: &'b str,
) -> Option<(&'a super::library::TitleEntry, &'b str)> {
    let mut boundaries: Vec<usize> = vec![cleaned.len()];
    for (i, ch) in cleaned.char_indices() {
        if ch == ' ' || ch == '.' {
            boundaries.push(i);
        }
    }
    boundaries.sort_unstable_by(|a, b| b.cmp(a));
    boundaries.dedup();

    for end in boundaries {
        if end == 0 {
            continue;
        }
        if let Some(entry) = library.title_entry(&cleaned[..end]) {
            return Some((entry, &cleaned[end..]));
        }
    }
    None
}

/// Split the remainder at the single allowed range separator.
fn split_range<'a>(input: &str, remainder: &'a str) -> Result<(&'a str, Option<&'a str>), RefError> {
    let mut parts = remainder.split('-');
    let start = parts.next().unwrap_or("");
    let end = parts.next();
    if parts.next().is_some() {
        return Err(RefError::bad_section(
            input,
            "more than one range separator",
        ));
    }
    if let Some(end) = end
        && end.trim().is_empty()
    {
        return Err(RefError::bad_section(input, "empty range end"));
    }
    Ok((start.trim(), end))
}

fn tokenize(part: &str) -> Vec<String> {
    if part.is_empty() {
        return Vec::new();
    }
    COMPONENT_SPLIT
        .split(part)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Canonicalize components against address types and assemble the Ref,
/// padding the end side by copying `sections` and overlaying the explicit
/// range suffix from the right.
fn build_ref(
    input: &str,
    book: String,
    node_path: SmallVec<[String; 2]>,
    address_types: &[AddressType],
    start_tokens: &[String],
    end_raw: Option<&str>,
) -> Result<Ref, RefError> {
    if start_tokens.len() > address_types.len() {
        return Err(RefError::bad_section(
            input,
            format!(
                "{} address components for a depth-{} text",
                start_tokens.len(),
                address_types.len()
            ),
        ));
    }

    let mut sections: SmallVec<[String; 4]> = SmallVec::new();
    for (i, token) in start_tokens.iter().enumerate() {
        let canonical = address_types[i]
            .canonical(token)
            .map_err(|e| RefError::bad_section(input, e.to_string()))?;
        sections.push(canonical);
    }

    let mut to_sections = sections.clone();
    if let Some(end_raw) = end_raw {
        let end_tokens = tokenize(end_raw);
        if end_tokens.is_empty() || end_tokens.len() > sections.len() {
            return Err(RefError::bad_section(
                input,
                "range end deeper than range start",
            ));
        }
        let offset = sections.len() - end_tokens.len();
        for (j, token) in end_tokens.iter().enumerate() {
            let canonical = address_types[offset + j]
                .canonical(token)
                .map_err(|e| RefError::bad_section(input, e.to_string()))?;
            to_sections[offset + j] = canonical;
        }
    }

    Ok(Ref {
        book,
        node_path,
        address_types: address_types.iter().copied().collect(),
        sections,
        to_sections,
    })
}
