//! Content snapshot codec.
//!
//! Serializes page content into a canonical HTML-subset string and parses it
//! back. Checkbox state is written as an explicit `checked` attribute so that
//! the snapshot, not just the live view, carries it.
//!
//! # Canonical form
//!
//! ```text
//! <div class="x">buy &lt;2&gt; milk<br></div><input type="checkbox" id="checkbox_1" checked>
//! ```
//!
//! - attribute values are always double-quoted
//! - void elements (`br`, `hr`, `input`, ...) have no closing tag
//! - checkboxes are `<input type="checkbox" id="...">` plus a bare `checked`
//!
//! Decoding is lenient, the way an editable HTML surface is: stray closing
//! tags are ignored, unclosed elements are closed at end of input, comments
//! are dropped, adjacent text is merged, and a checkbox with no id gets a
//! generated `checkbox_auto_<n>` id which is then written out explicitly.
//! Elements nested deeper than [`MAX_DEPTH`] are flattened: their tags are
//! dropped and their children land in the deepest open element.
//!
//! For trees without adjacent or empty text nodes, `decode(encode(t)) == t`;
//! for canonical strings, `encode(decode(s)) == s`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::{Checkbox, Element, Node, is_void_tag};

/// Deepest element nesting kept by [`decode`].
pub const MAX_DEPTH: usize = 512;

/// Serialized, comparable content of a page at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    /// Wrap an already-serialized snapshot.
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    /// The empty page.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Borrow the serialized form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the serialized form.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether the page has no content at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the serialized form contains `needle` (handy for assertions and search).
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Snapshot {
    fn from(content: String) -> Self {
        Self(content)
    }
}

impl From<&str> for Snapshot {
    fn from(content: &str) -> Self {
        Self(content.to_string())
    }
}

// =========================================================================
// Encoding
// =========================================================================

/// Encode content into its canonical snapshot.
pub fn encode(nodes: &[Node]) -> Snapshot {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    Snapshot(out)
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_text(text, out),
        Node::Checkbox(checkbox) => write_checkbox(checkbox, out),
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');

            if element.is_void() {
                return;
            }
            for child in &element.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn write_checkbox(checkbox: &Checkbox, out: &mut String) {
    out.push_str("<input type=\"checkbox\" id=\"");
    escape_attr(&checkbox.id, out);
    out.push('"');
    if checkbox.checked {
        out.push_str(" checked");
    }
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

// =========================================================================
// Decoding
// =========================================================================

/// Decode a snapshot into content nodes. Never fails.
pub fn decode(snapshot: &Snapshot) -> Vec<Node> {
    Parser::new(snapshot.as_str()).parse()
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    open: Vec<Element>,
    root: Vec<Node>,
    generated_ids: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            open: Vec::new(),
            root: Vec::new(),
            generated_ids: 0,
        }
    }

    fn parse(mut self) -> Vec<Node> {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];

            if let Some(comment) = rest.strip_prefix("<!--") {
                self.pos += match comment.find("-->") {
                    Some(end) => 4 + end + 3,
                    None => rest.len(),
                };
            } else if rest.starts_with("</") {
                match parse_end_tag(rest) {
                    Some((tag, consumed)) => {
                        self.pos += consumed;
                        self.close(&tag);
                    }
                    None => self.literal_lt(),
                }
            } else if rest.starts_with('<') {
                match parse_start_tag(rest) {
                    Some((tag, consumed)) => {
                        self.pos += consumed;
                        self.open_tag(tag);
                    }
                    None => self.literal_lt(),
                }
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = unescape(&rest[..end]);
                self.append_text(&text);
                self.pos += end;
            }
        }

        while let Some(element) = self.open.pop() {
            self.append(Node::Element(element));
        }
        self.root
    }

    fn literal_lt(&mut self) {
        self.append_text("<");
        self.pos += 1;
    }

    fn open_tag(&mut self, tag: StartTag) {
        let is_checkbox = tag.name == "input"
            && tag
                .attrs
                .iter()
                .any(|(k, v)| k == "type" && v.eq_ignore_ascii_case("checkbox"));

        if is_checkbox {
            let id = match tag.attrs.iter().find(|(k, _)| k == "id") {
                Some((_, id)) if !id.is_empty() => id.clone(),
                _ => {
                    let id = format!("checkbox_auto_{}", self.generated_ids);
                    self.generated_ids += 1;
                    id
                }
            };
            let checked = tag.attrs.iter().any(|(k, _)| k == "checked");
            self.append(Node::Checkbox(Checkbox { id, checked }));
            return;
        }

        let element = Element {
            tag: tag.name,
            attrs: tag.attrs,
            children: Vec::new(),
        };
        if is_void_tag(&element.tag) {
            self.append(Node::Element(element));
        } else if self.open.len() < MAX_DEPTH {
            self.open.push(element);
        }
    }

    fn close(&mut self, tag: &str) {
        if !self.open.iter().any(|element| element.tag == tag) {
            return;
        }
        while let Some(element) = self.open.pop() {
            let done = element.tag == tag;
            self.append(Node::Element(element));
            if done {
                break;
            }
        }
    }

    fn append(&mut self, node: Node) {
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        siblings.push(node);
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let Some(Node::Text(previous)) = siblings.last_mut() {
            previous.push_str(text);
        } else {
            siblings.push(Node::Text(text.to_string()));
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Parse `<name attr="v" ...>` at the start of `rest`.
fn parse_start_tag(rest: &str) -> Option<(StartTag, usize)> {
    let bytes = rest.as_bytes();
    if !bytes.get(1).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = rest[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                if i == start {
                    // Lone '=' or similar junk.
                    i += 1;
                    continue;
                }
                let attr_name = rest[start..i].to_ascii_lowercase();

                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let mut value = String::new();
                if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    match bytes.get(i)? {
                        quote @ (b'"' | b'\'') => {
                            let close = rest[i + 1..].find(*quote as char)?;
                            value = unescape(&rest[i + 1..i + 1 + close]);
                            i += close + 2;
                        }
                        _ => {
                            let start = i;
                            while i < bytes.len()
                                && !bytes[i].is_ascii_whitespace()
                                && bytes[i] != b'>'
                            {
                                i += 1;
                            }
                            value = unescape(&rest[start..i]);
                        }
                    }
                }
                attrs.push((attr_name, value));
            }
        }
    }

    Some((StartTag { name, attrs }, i))
}

/// Parse `</name>` at the start of `rest`.
fn parse_end_tag(rest: &str) -> Option<(String, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 2;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == 2 {
        return None;
    }
    let name = rest[2..i].to_ascii_lowercase();
    let close = rest[i..].find('>')?;
    Some((name, i + close + 1))
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
