//! Numeral codecs for domain-specific addressing systems.
//!
//! Two bijective encodings live here:
//! - `hebrew`: alphabetic numerals (letters carry values, summed additively)
//! - `folio`: two-sided page numbering (`1a, 1b, 2a, 2b, ...`)
//!
//! Both are exact inverses over their valid domains. Decoding reports an
//! error on out-of-vocabulary input instead of silently clamping.

pub mod folio;
pub mod hebrew;

pub use folio::{Folio, Side};
