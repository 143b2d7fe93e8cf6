use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sentinel country marker for sources that carry no country indicator.
pub const GLOBAL_COUNTRY: &str = "🌐";

/// One normalized, schema-independent news item.
///
/// All fields are strings; `published_at` is the feed's own date string,
/// carried verbatim. It may not be parseable; ordering handles that.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: String,
    /// Byline: the entry's own source attribution, falling back to the
    /// feed title.
    pub source: String,
    pub feed_title: String,
    pub country: String,
}

/// The digest envelope returned to dashboard consumers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub updated_at: DateTime<Utc>,
    pub items: Vec<Item>,
    pub sources: Vec<String>,
}
