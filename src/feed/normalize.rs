use super::xml::Element;
use crate::config::Source;
use crate::model::{Item, GLOBAL_COUNTRY};
use crate::util::{extract_href, strip_html};

/// Entry link fallback chain: a `link` child's `href` attribute (the Atom
/// shape; with repeated link elements the first href wins), then the
/// first `link` child's text content (the RSS shape).
pub fn entry_link(entry: &Element) -> String {
    for link in entry.children_named("link") {
        if let Some(href) = link.attr("href").filter(|h| !h.is_empty()) {
            return href.to_string();
        }
    }
    entry
        .children_named("link")
        .map(Element::text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Entry title, raw (markup still present; the caller strips it).
pub fn entry_title(entry: &Element) -> String {
    entry.child_text("title").unwrap_or_default().to_string()
}

/// Raw summary body: `description` (RSS), else `summary` (Atom).
///
/// Returned undecoded, since the embedded-href scan needs the markup intact.
pub fn raw_summary(entry: &Element) -> String {
    entry
        .child_text("description")
        .or_else(|| entry.child_text("summary"))
        .unwrap_or_default()
        .to_string()
}

/// Publication date fallback chain: `pubDate` (RSS), `published` /
/// `updated` (Atom), `date` (the local name of `dc:date`). First
/// non-empty wins; the value is kept verbatim and only interpreted at
/// sort time.
pub fn entry_published(entry: &Element) -> String {
    ["pubDate", "published", "updated", "date"]
        .into_iter()
        .find_map(|name| entry.child_text(name))
        .unwrap_or_default()
        .to_string()
}

/// Byline fallback chain: explicit `source` element, then the author's
/// `name`, then the feed title.
pub fn entry_byline(entry: &Element, feed_title: &str) -> String {
    if let Some(source) = entry.child_text("source") {
        return source.to_string();
    }
    if let Some(name) = entry.child("author").and_then(|a| a.child_text("name")) {
        return name.to_string();
    }
    feed_title.to_string()
}

/// Stable id fallback chain: `guid`, then the entry's own link, then its
/// title. Never empty as long as one of the three is non-empty.
pub fn entry_id(entry: &Element, link: &str, title: &str) -> String {
    if let Some(guid) = entry.child_text("guid") {
        return guid.to_string();
    }
    if !link.is_empty() {
        return link.to_string();
    }
    title.to_string()
}

/// Maps one raw entry into the canonical [`Item`].
///
/// The summary is scanned (undecoded) for an embedded `href`; a hit
/// overrides the entry's own link, because feeds that wrap the real
/// article URL in an HTML description leave the nominal link pointing at
/// an aggregator redirect. The id chain intentionally uses the entry's
/// own link, not the override.
pub fn normalize(entry: &Element, feed_title: &str, source: &Source) -> Item {
    let link = entry_link(entry);
    let title = entry_title(entry);
    let summary_raw = raw_summary(entry);
    let published_at = entry_published(entry);

    let summary = strip_html(&summary_raw);
    let link_from_summary = extract_href(&summary_raw);

    Item {
        id: entry_id(entry, &link, &title),
        title: strip_html(&title),
        link: link_from_summary.unwrap_or(link),
        summary,
        published_at,
        source: entry_byline(entry, feed_title),
        feed_title: feed_title.to_string(),
        country: source
            .country
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| GLOBAL_COUNTRY.to_string()),
    }
}
