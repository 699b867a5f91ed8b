//! Read-only preview rendering.
//!
//! The preview mirrors the editor content, checkbox state included, with
//! bare URLs and host names in text turned into links that open in a new tab.

use regex::Regex;
use std::sync::LazyLock;

use super::codec;
use super::node::{Element, Node};

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(https?://[^\s<>"{}|\\^`\[\]]+|(?:www\.)?[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*\.[a-z]{2,}(?:/[^\s<>"{}|\\^`\[\]]*)?)"#,
    )
    .expect("URL pattern is valid")
});

/// Render the preview HTML for `nodes`.
///
/// Returns an empty string for an empty document.
pub fn render_preview(nodes: &[Node]) -> String {
    let source = codec::encode(nodes);
    if source.as_str().trim().is_empty() {
        return String::new();
    }

    let linked: Vec<Node> = nodes.iter().flat_map(linkify).collect();
    codec::encode(&linked).into_string()
}

fn linkify(node: &Node) -> Vec<Node> {
    match node {
        Node::Text(text) => link_text(text),
        Node::Checkbox(_) => vec![node.clone()],
        // Anchors already link somewhere; leave their text alone.
        Node::Element(element) if element.tag == "a" => vec![node.clone()],
        Node::Element(element) => vec![Node::Element(Element {
            tag: element.tag.clone(),
            attrs: element.attrs.clone(),
            children: element.children.iter().flat_map(linkify).collect(),
        })],
    }
}

fn link_text(text: &str) -> Vec<Node> {
    let mut out = Vec::new();
    let mut last = 0;

    for found in URL_REGEX.find_iter(text) {
        if found.start() > last {
            out.push(Node::text(&text[last..found.start()]));
        }
        out.push(anchor(found.as_str()));
        last = found.end();
    }

    if last < text.len() {
        out.push(Node::text(&text[last..]));
    }
    out
}

fn anchor(matched: &str) -> Node {
    let lower = matched.to_ascii_lowercase();
    let href = if lower.starts_with("http://") || lower.starts_with("https://") {
        matched.to_string()
    } else {
        format!("https://{}", matched)
    };

    Element::new("a")
        .with_attr("href", href)
        .with_attr("target", "_blank")
        .with_attr("rel", "noopener noreferrer")
        .with_child(Node::text(matched))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_renders_nothing() {
        assert_eq!(render_preview(&[]), "");
        assert_eq!(render_preview(&[Node::text("   ")]), "");
    }

    #[test]
    fn test_links_get_scheme_and_target() {
        let html = render_preview(&[Node::text("see www.example.com today")]);
        assert_eq!(
            html,
            r#"see <a href="https://www.example.com" target="_blank" rel="noopener noreferrer">www.example.com</a> today"#
        );
    }

    #[test]
    fn test_explicit_scheme_is_kept() {
        let html = render_preview(&[Node::text("http://a.io/x?y=1")]);
        assert!(html.starts_with(r#"<a href="http://a.io/x?y=1""#));
    }

    #[test]
    fn test_existing_anchor_untouched() {
        let nodes = vec![
            Element::new("a")
                .with_attr("href", "https://docs.rs")
                .with_child(Node::text("docs.rs"))
                .into(),
        ];
        assert_eq!(render_preview(&nodes), codec::encode(&nodes).into_string());
    }

    #[test]
    fn test_checkbox_state_mirrored() {
        let nodes = vec![Node::checkbox("checkbox_1", true), Node::text("  done")];
        assert_eq!(
            render_preview(&nodes),
            r#"<input type="checkbox" id="checkbox_1" checked>  done"#
        );
    }

    #[test]
    fn test_plain_words_are_not_links() {
        let html = render_preview(&[Node::text("just some words")]);
        assert_eq!(html, "just some words");
    }
}
