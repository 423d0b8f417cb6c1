//! Best-effort HTML tree parser
//!
//! This is deliberately not an HTML5 parser. It knows nothing about void
//! elements, implicit tag closing or entities: an element's content is found
//! by counting `<tag` against `</tag` prefixes, and anything that never
//! closes is kept as an element with empty content whose following markup
//! becomes its siblings. Parsing is total: malformed input degrades to
//! partial or empty subtrees instead of failing.

use std::collections::BTreeMap;

/// Attribute map of an element. Duplicate keys keep the last written value.
pub type Attributes = BTreeMap<String, String>;

/// One parsed tag with its attributes, raw markup and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name exactly as written (case-sensitive)
    pub tag: String,
    /// Verbatim source slice, from the opening `<` to the end of the closing tag
    pub raw_text: String,
    pub attributes: Attributes,
    /// Raw inner markup
    pub content: String,
    pub children: Vec<Element>,
}

/// Shared sentinel returned by queries that find nothing.
pub(crate) static EMPTY_ELEMENT: Element = Element {
    tag: String::new(),
    raw_text: String::new(),
    attributes: BTreeMap::new(),
    content: String::new(),
    children: Vec::new(),
};

impl Element {
    /// Value of an attribute, if present
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// True for the sentinel element produced by an unsuccessful query
    pub fn is_empty(&self) -> bool {
        self.tag.is_empty() && self.raw_text.is_empty()
    }
}

/// Parse markup into a forest of elements.
///
/// Comments are removed first (see [`strip_comments`]), then the text is
/// scanned for elements left to right.
pub fn parse(html: &str) -> Vec<Element> {
    parse_fragment(&strip_comments(html))
}

/// Remove every `<!-- ... -->` span, first opener to first closer after it,
/// until no opener remains. An opener without closer truncates the text.
pub fn strip_comments(html: &str) -> String {
    let mut text = html.to_string();

    while let Some(start) = text.find("<!--") {
        match text[start + 4..].find("-->") {
            Some(offset) => text.replace_range(start..start + 4 + offset + 3, ""),
            None => text.truncate(start),
        }
    }

    text
}

fn parse_fragment(html: &str) -> Vec<Element> {
    let mut cursor = Cursor::new(html);
    let mut elements = Vec::new();

    while let Some(element) = cursor.next_element() {
        elements.push(element);
    }

    elements
}

/// Forward-only scanner over one nesting level of markup.
///
/// Every scanning step is a pure function of the input and a start offset
/// that returns the offset where it stopped; only [`Cursor::next_element`]
/// moves the cursor.
pub struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

/// Where an element's content ends and where its closing tag ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentSpan {
    close: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse the next element at this nesting level, if any `<` remains.
    pub fn next_element(&mut self) -> Option<Element> {
        let input = self.input;
        let start = self.pos + input.get(self.pos..)?.find('<')?;

        let tag_end = scan_tag_name(input, start + 1);
        let tag = &input[start + 1..tag_end];
        let (attributes, open_end) = scan_attributes(input, tag_end);

        let (content, end) = match scan_content(input, open_end, tag) {
            Some(span) => (&input[open_end..span.close], span.end),
            // Unterminated (or void) element: keep the opening tag only
            None => ("", open_end),
        };

        self.pos = end.max(start + 1);

        Some(Element {
            tag: tag.to_string(),
            raw_text: input[start..end].to_string(),
            attributes,
            content: content.to_string(),
            children: parse_fragment(content),
        })
    }
}

fn is_tag_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'>' || byte == b'\\'
}

/// Returns the offset of the first byte after the tag name.
fn scan_tag_name(input: &str, from: usize) -> usize {
    input.as_bytes()[from..]
        .iter()
        .position(|&b| is_tag_delimiter(b))
        .map_or(input.len(), |offset| from + offset)
}

/// Read `key="value"` pairs until the `>` (or `/>`) closing the opening tag.
///
/// Returns the attributes and the offset just past that `>`. A value whose
/// quote never recurs consumes the rest of the input.
fn scan_attributes(input: &str, from: usize) -> (Attributes, usize) {
    let bytes = input.as_bytes();
    let mut attributes = Attributes::new();
    let mut key_start = from;
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            b'>' => {
                insert_bare_key(&mut attributes, &input[key_start..i]);
                return (attributes, i + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                insert_bare_key(&mut attributes, &input[key_start..i]);
                return (attributes, i + 2);
            }
            b'=' => {
                let key = input[key_start..i].trim();
                let (value, next) = scan_value(input, i + 1);
                if !key.is_empty() {
                    attributes.insert(key.to_string(), value.to_string());
                }
                i = next;
                key_start = next;
            }
            b if b.is_ascii_whitespace() => {
                insert_bare_key(&mut attributes, &input[key_start..i]);
                i += 1;
                key_start = i;
            }
            _ => i += 1,
        }
    }

    insert_bare_key(&mut attributes, &input[key_start..]);
    (attributes, bytes.len())
}

/// Valueless attributes such as `disabled` map to an empty string.
fn insert_bare_key(attributes: &mut Attributes, key: &str) {
    let key = key.trim();
    if !key.is_empty() {
        attributes.insert(key.to_string(), String::new());
    }
}

/// Read an attribute value starting right after `=`.
fn scan_value(input: &str, from: usize) -> (&str, usize) {
    let bytes = input.as_bytes();

    match bytes.get(from) {
        Some(&quote @ (b'"' | b'\'')) => {
            let value_start = from + 1;
            match input[value_start..].find(char::from(quote)) {
                Some(offset) => (
                    &input[value_start..value_start + offset],
                    value_start + offset + 1,
                ),
                None => (&input[value_start..], input.len()),
            }
        }
        _ => {
            let end = bytes[from.min(bytes.len())..]
                .iter()
                .position(|&b| b.is_ascii_whitespace() || b == b'>')
                .map_or(input.len(), |offset| from + offset);
            (&input[from.min(end)..end], end)
        }
    }
}

/// Find the closing tag matching an element whose content starts at `from`.
fn scan_content(input: &str, from: usize, tag: &str) -> Option<ContentSpan> {
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut depth = 1usize;
    let mut i = from;

    while let Some(offset) = input.get(i..)?.find('<') {
        let at = i + offset;
        let rest = &input[at..];

        if rest.starts_with(&close) {
            depth -= 1;
            if depth == 0 {
                let end = rest.find('>').map_or(input.len(), |gt| at + gt + 1);
                return Some(ContentSpan { close: at, end });
            }
        } else if rest.starts_with(&open) {
            depth += 1;
        }

        i = at + 1;
    }

    None
}
