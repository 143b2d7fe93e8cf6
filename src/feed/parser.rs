use super::xml::{parse_tree, Element, XmlError};

/// A feed document classified by detected schema.
///
/// The two syndication dialects this service understands carry their
/// entries in different containers: RSS 2.0 under `<rss><channel>`, Atom
/// directly under `<feed>`. Everything else is `Unrecognized` and
/// contributes nothing rather than failing the source.
#[derive(Debug)]
pub enum FeedDocument {
    /// RSS 2.0: the contained element is the `channel`.
    Rss(Element),
    /// Atom: the contained element is the `feed` itself.
    Atom(Element),
    Unrecognized,
}

/// Classifies a document tree by its root element.
pub fn classify(mut root: Element) -> FeedDocument {
    if root.name == "rss" {
        if let Some(channel) = root.take_children("channel").into_iter().next() {
            return FeedDocument::Rss(channel);
        }
        return FeedDocument::Unrecognized;
    }
    if root.name == "feed" {
        return FeedDocument::Atom(root);
    }
    FeedDocument::Unrecognized
}

/// A parsed feed: its display title and raw entries awaiting normalization.
#[derive(Debug)]
pub struct ParsedFeed {
    pub title: String,
    pub entries: Vec<Element>,
}

/// Parses raw feed bytes into a title and a sequence of raw entries.
///
/// Entry containers are read per detected schema; a feed with a single
/// `<item>` yields a one-element sequence the same way a feed with many
/// does. The feed title falls back to the configured source name when the
/// document omits one. Unrecognized schemas yield zero entries; only
/// documents the XML reader rejects outright surface as an error.
pub fn parse_feed(bytes: &[u8], fallback_title: &str) -> Result<ParsedFeed, XmlError> {
    let root = parse_tree(bytes)?;

    let (mut container, entry_name) = match classify(root) {
        FeedDocument::Rss(channel) => (channel, "item"),
        FeedDocument::Atom(feed) => (feed, "entry"),
        FeedDocument::Unrecognized => {
            return Ok(ParsedFeed {
                title: fallback_title.to_string(),
                entries: Vec::new(),
            })
        }
    };

    let title = container
        .child_text("title")
        .unwrap_or(fallback_title)
        .to_string();
    let entries = container.take_children(entry_name);

    Ok(ParsedFeed { title, entries })
}
