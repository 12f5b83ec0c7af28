//! Lectern - incremental reader core for hierarchically structured text
//! corpora.
//!
//! Three tightly coupled pieces:
//!
//! - the **reference model** ([`refs`], [`schema`], [`numeral`]): parsing
//!   and round-tripping human locators ("Genesis 1:1-5", "Shabbat 21a")
//!   against recursive work schemas, with Hebrew-numeral and daf/amud
//!   codecs;
//! - the **section cache** ([`cache`]): a content-addressed store keyed by
//!   normalized ref that holds text at section granularity and regenerates
//!   finer-grained views on demand without re-fetching;
//! - the **scroll-anchored loader** ([`loader`]): the controller that
//!   prefetches adjacent sections as the reader approaches an edge and
//!   preserves the visual anchor across asynchronous prepends.
//!
//! The embedding application supplies a [`fetch::TextFetcher`] for the
//! backend and a [`loader::Measurer`]/[`loader::ScrollPort`] pair for the
//! rendering surface; everything else is owned here.
//!
//! ```ignore
//! let mut library = Library::new();
//! library.load_shape("Genesis", &fetcher).await?;
//! let library = Arc::new(library);
//!
//! let cache = Arc::new(SectionCache::new(library.clone()));
//! let mut loader = ScrollLoader::new(
//!     library, cache, Arc::new(fetcher), surface, config.loader,
//! );
//! loader.jump_to("Genesis 1:1").await?;
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod fetch;
pub mod loader;
pub mod logger;
pub mod numeral;
pub mod refs;
pub mod schema;

pub use cache::SectionCache;
pub use config::ReaderConfig;
pub use core::{DecodeError, FetchError, RefError};
pub use fetch::{TextFetcher, TextPayload, VersionSelector};
pub use loader::ScrollLoader;
pub use refs::{Library, Ref};
pub use schema::{AddressType, SchemaNode, Work};
