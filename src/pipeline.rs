//! The feed-aggregation pipeline: concurrent fetch, parse, normalize,
//! dedupe, bounded link resolution, deterministic ordering, truncation.
//!
//! Failures are recovered as close to their origin as possible: a bad
//! source contributes zero items, a failed link resolution keeps the
//! normalized link. Only a failure with no narrower isolation boundary
//! (a panicked source task) surfaces as a pipeline error.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::cmp::Reverse;
use std::collections::HashSet;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{Config, Source};
use crate::feed::{normalize, parse_feed, XmlError};
use crate::fetch::{fetch_bytes, Deadline, FetchError};
use crate::model::{Digest, Item};
use crate::resolve::{resolve_link, RedirectCache};

/// Upper bound on items in the emitted digest.
pub const MAX_ITEMS: usize = 60;

/// Only the first this-many deduped items get link resolution, keeping
/// outbound call volume bounded per invocation.
pub const MAX_RESOLVE: usize = 20;

/// Errors that escape every per-source and per-item isolation boundary.
#[derive(Debug, Error)]
pub enum DigestError {
    /// A source task panicked or was cancelled.
    #[error("Source task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why one source contributed nothing this invocation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] XmlError),
}

/// Outcome of one source's fetch+parse+normalize, success or not.
///
/// Kept as an explicit result per source (rather than silently swallowed)
/// so degraded-but-successful runs are observable and testable.
#[derive(Debug)]
pub struct SourceFetch {
    pub source: String,
    pub outcome: Result<Vec<Item>, SourceError>,
}

/// Fetches, parses, and normalizes every configured source concurrently.
///
/// Results come back in registry order regardless of completion order;
/// dedupe depends on that for its source-priority tie-breaking. Fan-out
/// width equals the source count; each task carries its own deadline and
/// a timeout on one source never affects its siblings.
pub async fn collect_sources(
    client: &reqwest::Client,
    sources: &[Source],
    deadline: Deadline,
) -> Result<Vec<SourceFetch>, DigestError> {
    let handles: Vec<JoinHandle<SourceFetch>> = sources
        .iter()
        .cloned()
        .map(|source| {
            let client = client.clone();
            tokio::spawn(async move {
                let outcome = fetch_source(&client, &source, deadline).await;
                SourceFetch {
                    source: source.name,
                    outcome,
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await?);
    }
    Ok(results)
}

async fn fetch_source(
    client: &reqwest::Client,
    source: &Source,
    deadline: Deadline,
) -> Result<Vec<Item>, SourceError> {
    let bytes = fetch_bytes(client, &source.url, deadline).await?;
    let feed = parse_feed(&bytes, &source.name)?;
    tracing::debug!(
        source = %source.name,
        feed_title = %feed.title,
        entries = feed.entries.len(),
        "Parsed feed"
    );
    Ok(feed
        .entries
        .iter()
        .map(|entry| normalize(entry, &feed.title, source))
        .collect())
}

/// Removes duplicate items, keeping the first occurrence per key.
///
/// Key = link when non-empty, else title; items with neither are dropped.
/// Input order is registry order then within-feed order, so ties resolve
/// to the higher-priority source.
pub fn dedupe(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        let key = if item.link.is_empty() {
            item.title.clone()
        } else {
            item.link.clone()
        };
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        out.push(item);
    }
    out
}

/// Interprets a feed date string as a unix timestamp.
///
/// RSS `pubDate` is RFC 2822, Atom and `dc:date` are RFC 3339; anything
/// else counts as missing.
pub fn published_ts(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.timestamp())
}

/// Newest first; items with unparseable or missing dates sink to the end.
/// The sort is stable, so equally-dated items keep their dedupe order.
fn sort_newest_first(items: &mut [Item]) {
    items.sort_by_key(|item| Reverse(published_ts(&item.published_at).unwrap_or(i64::MIN)));
}

/// Runs the whole pipeline and builds the digest envelope.
pub async fn build_digest(
    config: &Config,
    client: &reqwest::Client,
    redirects: &RedirectCache,
) -> Result<Digest, DigestError> {
    let deadline = Deadline::from_millis(config.fetch.timeout_ms);

    let results = collect_sources(client, &config.sources, deadline).await?;

    let mut merged = Vec::new();
    for fetch in results {
        match fetch.outcome {
            Ok(items) => {
                tracing::debug!(source = %fetch.source, items = items.len(), "Source contributed");
                merged.extend(items);
            }
            Err(e) => {
                tracing::warn!(source = %fetch.source, error = %e, "Source skipped");
            }
        }
    }

    let mut items = dedupe(merged);

    // Bounded enrichment: resolve redirect links for the head of the
    // deduped list only, concurrently, in place.
    let bound = items.len().min(MAX_RESOLVE);
    let resolutions = items[..bound].iter_mut().map(|item| async move {
        let original = std::mem::take(&mut item.link);
        item.link = resolve_link(client, redirects, &original, deadline).await;
    });
    join_all(resolutions).await;

    sort_newest_first(&mut items);
    items.truncate(MAX_ITEMS);

    Ok(Digest {
        updated_at: Utc::now(),
        items,
        sources: config.source_names(),
    })
}
