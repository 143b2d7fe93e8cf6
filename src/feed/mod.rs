//! Feed parsing and normalization for RSS 2.0 and Atom documents.
//!
//! The module is organized into three layers:
//!
//! - [`xml`] - A generic, namespace-stripping attribute/text tree built on
//!   `quick-xml` events
//! - [`parser`] - Schema detection (RSS channel vs. Atom feed) and entry
//!   extraction
//! - [`normalize`] - Per-field fallback chains mapping a raw entry into the
//!   canonical [`Item`](crate::model::Item)
//!
//! Divergent feed shapes are resolved here so the rest of the pipeline only
//! ever sees the canonical record.

pub mod normalize;
pub mod parser;
pub mod xml;

pub use normalize::normalize;
pub use parser::{parse_feed, FeedDocument, ParsedFeed};
pub use xml::{Element, XmlError};
