use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors that can occur while building the element tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The underlying XML reader rejected the document.
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),
    /// The document ended with unclosed elements.
    #[error("Truncated XML document")]
    Truncated,
    /// The document contains no element at all.
    #[error("No document element")]
    Empty,
}

/// One element of a parsed feed document.
///
/// A deliberately generic attribute/text tree: element and attribute names
/// are reduced to their local part so namespaced elements like `dc:date`
/// are addressed as `date`, and the divergent shapes feeds use for the
/// same field (a bare text element, an attribute-bearing `<link href>`,
/// repeated siblings) all land in one uniform representation that the
/// per-field fallback chains can walk.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Trimmed text content of this element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// First attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given local name.
    /// `None` when the child is missing or its text is empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text).filter(|t| !t.is_empty())
    }

    /// Removes and returns all children with the given local name,
    /// preserving document order.
    pub fn take_children(&mut self, name: &str) -> Vec<Element> {
        let (taken, kept) = std::mem::take(&mut self.children)
            .into_iter()
            .partition(|c| c.name == name);
        self.children = kept;
        taken
    }
}

fn local_name(qname: &[u8]) -> String {
    let local = match qname.iter().rposition(|&b| b == b':') {
        Some(idx) => &qname[idx + 1..],
        None => qname,
    };
    String::from_utf8_lossy(local).into_owned()
}

fn element_from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Element {
    let mut attrs = Vec::new();
    for attr_result in start.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::trace!(error = %e, "Skipping malformed attribute");
                continue;
            }
        };
        // Namespace declarations are noise once prefixes are stripped
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = local_name(attr.key.as_ref());
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attrs.push((key, value));
    }

    Element {
        name: local_name(start.name().as_ref()),
        attrs,
        text: String::new(),
        children: Vec::new(),
    }
}

/// Parses a byte stream into an element tree rooted at the document element.
///
/// Namespace prefixes are stripped, text and CDATA sections are accumulated
/// per element, and undecodable entities fall back to the raw byte run
/// (feeds are full of bare ampersands). Anything before the document
/// element (declaration, comments, doctype) is skipped.
pub fn parse_tree(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    // Synthetic root collects the document element; depth 1 == inside it
    let mut stack: Vec<Element> = vec![Element::default()];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let el = element_from_start(&e, &reader);
                stack.push(el);
            }
            Event::Empty(e) => {
                let el = element_from_start(&e, &reader);
                if let Some(top) = stack.last_mut() {
                    top.children.push(el);
                }
            }
            Event::End(_) => {
                // The reader rejects unmatched end tags, so anything popped
                // here has a parent left on the stack.
                if stack.len() > 1 {
                    let el = stack.pop();
                    if let (Some(el), Some(parent)) = (el, stack.last_mut()) {
                        parent.children.push(el);
                    }
                }
            }
            Event::Text(t) => {
                let text = match t.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(_) => String::from_utf8_lossy(t.as_ref()).into_owned(),
                };
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(c.as_ref()));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    match stack.pop() {
        Some(root) if stack.is_empty() => root.children.into_iter().next().ok_or(XmlError::Empty),
        _ => Err(XmlError::Truncated),
    }
}
