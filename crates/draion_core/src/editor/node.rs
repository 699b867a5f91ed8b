//! Structural tree of an editable page.
//!
//! This is the view-independent shape of the content: what the snapshot codec
//! encodes and what a view is rebuilt from. Live node identity (for cursor
//! anchors) lives in the view, not here.

/// Elements that never have children or a closing tag.
pub const VOID_TAGS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Whether `tag` is a void element.
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// A node of page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Plain text.
    Text(String),
    /// A structural element such as `div`, `b` or `hr`.
    Element(Element),
    /// An interactive checkbox with a stable id.
    Checkbox(Checkbox),
}

/// A structural element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes; always empty for void elements.
    pub children: Vec<Node>,
}

/// A checkbox whose checked state travels with the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox {
    /// Stable id used to find the same logical checkbox across snapshots.
    pub id: String,
    /// Whether the box is ticked.
    pub checked: bool,
}

impl Node {
    /// Text node helper.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// Checkbox node helper.
    pub fn checkbox(id: impl Into<String>, checked: bool) -> Self {
        Node::Checkbox(Checkbox {
            id: id.into(),
            checked,
        })
    }

    /// `<br>` helper.
    pub fn line_break() -> Self {
        Node::Element(Element::new("br"))
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Node::Checkbox(_) => {}
        }
    }
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute (builder pattern).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Add a child (builder pattern).
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether this element is void.
    pub fn is_void(&self) -> bool {
        is_void_tag(&self.tag)
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// Concatenated text of a node list.
pub fn text_content(nodes: &[Node]) -> String {
    nodes.iter().map(Node::text_content).collect()
}
