use std::borrow::Cow;

/// Decodes the five standard HTML entities.
///
/// Feed summaries routinely arrive double-escaped (`&amp;lt;` for `&lt;`),
/// so replacements run sequentially with `&amp;` first, matching how
/// aggregators that emit these summaries expect them to be read back.
///
/// Returns `Cow::Borrowed` when the input contains no `&` (common case).
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'"),
    )
}

/// Strips HTML markup from a feed summary.
///
/// Tags are replaced by a space, whitespace runs are collapsed to a single
/// space, the result is trimmed, and entities are decoded last. A `<` that
/// never closes drops the rest of the string, which is the safe reading of
/// a truncated summary.
///
/// # Examples
///
/// ```
/// use newswire::util::strip_html;
///
/// assert_eq!(strip_html("<p>Hello  <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html("a &amp; b"), "a & b");
/// ```
pub fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    decode_entities(&collapsed).into_owned()
}

/// Extracts the first `href="…"` value from raw (undecoded) HTML.
///
/// Some feeds bury the real article URL inside an HTML-formatted
/// description while the nominal link field points at an aggregator
/// redirect; the embedded href is the more useful destination. The
/// attribute name matches case-insensitively, the value is entity-decoded,
/// and an empty value counts as absent.
pub fn extract_href(raw: &str) -> Option<String> {
    const NEEDLE: &str = "href=\"";

    let lower = raw.to_ascii_lowercase();
    let start = lower.find(NEEDLE)? + NEEDLE.len();
    let end = raw[start..].find('"')? + start;

    if start == end {
        return None;
    }
    Some(decode_entities(&raw[start..end]).into_owned())
}
