//! Core types - pure abstractions shared across the codebase.

mod error;

pub use error::{DecodeError, FetchError, RefError};
