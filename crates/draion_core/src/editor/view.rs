//! Editor view contract and the in-memory live view.
//!
//! [`EditorView`] is what a sync session needs from an editing surface. Hosts
//! with their own widget implement it directly; [`DocumentView`] is a complete
//! in-memory implementation used by the CLI and the tests.
//!
//! Views report activity through a [`ViewObserver`]: `view_changed` after every
//! structural mutation (replacements included) and `checkbox_toggled` when a
//! bound checkbox flips. Observers are called synchronously while the caller
//! holds the view, so they must not try to lock it again.

use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::codec::{self, Snapshot};
use super::cursor::{CursorPosition, NodeId, Position};
use super::node::{Checkbox, Element, Node};
use super::preview::render_preview;

static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\s").unwrap());

/// Receives change notifications from a view.
pub trait ViewObserver: Send + Sync {
    /// Content changed (typing, insertion, replacement).
    fn view_changed(&self);

    /// A bound checkbox was toggled by the user.
    fn checkbox_toggled(&self, checkbox_id: &str);
}

/// An editable surface plus its read-only preview.
pub trait EditorView: Send + 'static {
    /// Current content, checkbox states included.
    fn content(&self) -> Vec<Node>;

    /// Replace all content. Invalidates every existing position.
    fn replace_content(&mut self, nodes: Vec<Node>);

    /// Attach toggle listeners to checkboxes that have none. Returns how many were bound.
    fn bind_checkboxes(&mut self) -> usize;

    fn selection(&self) -> Option<CursorPosition>;

    fn set_selection(&mut self, selection: CursorPosition);

    /// Whether `position` resolves to a live node with an in-range offset.
    fn is_valid_position(&self, position: &Position) -> bool;

    /// Collapse the caret at the end of the document.
    fn place_cursor_at_end(&mut self);

    fn focus(&mut self);

    /// Re-render the preview from the current content.
    fn refresh_preview(&mut self);

    fn set_observer(&mut self, observer: Arc<dyn ViewObserver>);

    fn clear_observer(&mut self);
}

#[derive(Debug, Clone)]
struct LiveNode {
    id: NodeId,
    kind: LiveKind,
}

#[derive(Debug, Clone)]
enum LiveKind {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<LiveNode>,
    },
    Checkbox {
        id: String,
        checked: bool,
        bound: bool,
    },
}

/// Where an insertion lands relative to the node under the caret.
enum Target {
    Inside(usize),
    Before,
    After,
}

/// In-memory editor view backed by a live node tree.
pub struct DocumentView {
    children: Vec<LiveNode>,
    next_id: u64,
    selection: Option<CursorPosition>,
    focused: bool,
    preview: String,
    observer: Option<Arc<dyn ViewObserver>>,
}

impl Default for DocumentView {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentView {
    /// An empty, unfocused view with no selection.
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            next_id: NodeId::ROOT.0 + 1,
            selection: None,
            focused: false,
            preview: String::new(),
            observer: None,
        }
    }

    /// Canonical encoding of the current content.
    pub fn snapshot(&self) -> Snapshot {
        codec::encode(&self.content())
    }

    /// Plain text of the document.
    pub fn text_content(&self) -> String {
        super::node::text_content(&self.content())
    }

    /// Last rendered preview HTML.
    pub fn preview_html(&self) -> &str {
        &self.preview
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Ids of every live node in document order (root excluded).
    pub fn node_ids(&self) -> Vec<NodeId> {
        fn walk(nodes: &[LiveNode], out: &mut Vec<NodeId>) {
            for node in nodes {
                out.push(node.id);
                if let LiveKind::Element { children, .. } = &node.kind {
                    walk(children, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }

    /// Checked state of the checkbox with this id.
    pub fn checkbox_state(&self, checkbox_id: &str) -> Option<bool> {
        find_checkbox(&self.children, checkbox_id).map(|(checked, _)| checked)
    }

    /// Whether the checkbox with this id has a toggle listener.
    pub fn is_checkbox_bound(&self, checkbox_id: &str) -> Option<bool> {
        find_checkbox(&self.children, checkbox_id).map(|(_, bound)| bound)
    }

    /// Collapse the caret at `position`. Returns false if it does not resolve.
    pub fn set_caret(&mut self, position: Position) -> bool {
        if !self.is_valid_position(&position) {
            return false;
        }
        self.selection = Some(CursorPosition::caret(position));
        true
    }

    /// Type `text` at the caret (or at the end when there is no caret).
    ///
    /// Text is typed one character at a time and shortcuts expand as they
    /// complete:
    ///
    /// | typed                        | becomes      |
    /// |------------------------------|--------------|
    /// | `- ` at the start of a line  | `• `         |
    /// | `[] ` or `/check `           | a checkbox   |
    /// | `---` or `/div `             | a divider    |
    /// | `/ul `                       | `• `         |
    /// | `/ol `                       | `1. `        |
    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut buf = [0; 4];
        for c in text.chars() {
            self.put_text(c.encode_utf8(&mut buf));
            if c == ' ' || c == '-' {
                self.expand_shortcut();
            }
        }
        self.edited();
    }

    /// Insert a `<br>` at the caret.
    ///
    /// When the line just ended is a bullet (`• `) or numbered (`N. `) item,
    /// the new line starts with the next marker.
    pub fn insert_line_break(&mut self) {
        let br = self.adopt(Node::line_break());
        let (path, after) = self.insert_nodes(vec![br]);
        let container = self.container_id(&path);
        self.selection = Some(CursorPosition::caret(Position::new(container, after)));

        if let Some(marker) = self.list_continuation() {
            self.put_text(&marker);
        }
        self.edited();
    }

    /// Insert an unchecked checkbox followed by two spaces, with the caret after
    /// the spaces. The new checkbox is bound immediately. Returns its id.
    pub fn insert_checkbox(&mut self) -> String {
        let checkbox_id = self.put_checkbox();
        self.edited();
        checkbox_id
    }

    /// Insert a horizontal divider with the caret on the line below it.
    ///
    /// A line break goes in first when the current line already has text.
    pub fn insert_divider(&mut self) {
        self.put_divider();
        self.edited();
    }

    /// Apply a checkbox change made in the preview to the editor.
    ///
    /// A real change refreshes the preview and is reported as a toggle so it
    /// gets saved. Returns false when no checkbox has this id.
    pub fn sync_checkbox_from_preview(&mut self, checkbox_id: &str, checked: bool) -> bool {
        let Some((current, _)) = find_checkbox_mut(&mut self.children, checkbox_id) else {
            return false;
        };
        if *current == checked {
            return true;
        }
        *current = checked;
        self.preview = render_preview(&self.content());

        if let Some(observer) = &self.observer {
            observer.checkbox_toggled(checkbox_id);
        }
        true
    }

    /// Flip a checkbox as a user click would. Bound checkboxes report the
    /// toggle to the observer; unbound ones flip silently.
    ///
    /// Returns false when no checkbox has this id.
    pub fn toggle_checkbox(&mut self, checkbox_id: &str) -> bool {
        let Some((checked, bound)) = find_checkbox_mut(&mut self.children, checkbox_id) else {
            return false;
        };
        *checked = !*checked;
        let bound = *bound;
        self.preview = render_preview(&self.content());

        if bound && let Some(observer) = &self.observer {
            observer.checkbox_toggled(checkbox_id);
        }
        true
    }

    // ==== Typing ====

    /// Raw insertion at the caret. No shortcuts, no notification.
    fn put_text(&mut self, text: &str) {
        if let Some(caret) = self.selection.map(|s| s.start)
            && let Some(LiveNode {
                kind: LiveKind::Text(existing),
                ..
            }) = find_mut(&mut self.children, caret.node)
        {
            let byte = char_to_byte(existing, caret.offset);
            existing.insert_str(byte, text);
            let offset = caret.offset.min(existing.chars().count()) + text.chars().count();
            self.selection = Some(CursorPosition::caret(Position::new(caret.node, offset)));
            return;
        }

        let (path, index) = self.insertion_point();
        let new_id = self.alloc_id();
        let caret = with_container(&mut self.children, &path, |container| {
            // Extend a text node sitting right before the insertion point.
            if index > 0
                && let Some(LiveNode {
                    id,
                    kind: LiveKind::Text(existing),
                }) = container.get_mut(index - 1)
            {
                existing.push_str(text);
                return Position::new(*id, existing.chars().count());
            }
            let index = index.min(container.len());
            container.insert(
                index,
                LiveNode {
                    id: new_id,
                    kind: LiveKind::Text(text.to_string()),
                },
            );
            Position::new(new_id, text.chars().count())
        });
        self.selection = Some(CursorPosition::caret(caret));
    }

    fn put_checkbox(&mut self) -> String {
        let base = format!("checkbox_{}", Utc::now().timestamp_millis());
        let mut checkbox_id = base.clone();
        let mut suffix = 1;
        while find_checkbox(&self.children, &checkbox_id).is_some() {
            checkbox_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        let checkbox = LiveNode {
            id: self.alloc_id(),
            kind: LiveKind::Checkbox {
                id: checkbox_id.clone(),
                checked: false,
                bound: true,
            },
        };
        let spacer_id = self.alloc_id();
        let spacer = LiveNode {
            id: spacer_id,
            kind: LiveKind::Text("  ".to_string()),
        };

        self.insert_nodes(vec![checkbox, spacer]);
        self.selection = Some(CursorPosition::caret(Position::new(spacer_id, 2)));
        checkbox_id
    }

    fn put_divider(&mut self) {
        let before = self.text_before_caret();
        let current_line = before.rsplit('\n').next().unwrap_or_default();

        let mut nodes = Vec::with_capacity(3);
        if !current_line.trim().is_empty() {
            nodes.push(self.adopt(Node::line_break()));
        }
        nodes.push(self.adopt(Element::new("hr").with_attr("class", "divider-line").into()));
        nodes.push(self.adopt(Node::line_break()));

        let (path, after) = self.insert_nodes(nodes);
        let container = self.container_id(&path);
        self.selection = Some(CursorPosition::caret(Position::new(container, after)));
    }

    /// Expand a shortcut that the last typed character completed.
    fn expand_shortcut(&mut self) {
        let before = self.text_before_caret();

        if before.ends_with("---") {
            if self.delete_before_caret("---") {
                log::trace!("[DocumentView] Expanding --- into a divider");
                self.put_divider();
            }
            return;
        }
        if before.ends_with("[] ") {
            if self.delete_before_caret("[] ") {
                self.put_checkbox();
            }
            return;
        }
        if let Some(line) = before.rsplit('\n').next()
            && line.trim_start() == "- "
        {
            if self.delete_before_caret("- ") {
                self.put_text("• ");
            }
            return;
        }

        let Some(typed) = before.strip_suffix(' ') else {
            return;
        };
        let command = typed.rsplit(char::is_whitespace).next().unwrap_or_default();
        if !matches!(command, "/check" | "/ul" | "/ol" | "/div") {
            return;
        }
        if !self.delete_before_caret(&format!("{} ", command)) {
            return;
        }
        log::trace!("[DocumentView] Expanding {}", command);
        match command {
            "/check" => {
                self.put_checkbox();
            }
            "/ul" => self.put_text("• "),
            "/ol" => self.put_text("1. "),
            _ => self.put_divider(),
        }
    }

    /// Marker that continues the list item on the line just ended, if any.
    fn list_continuation(&self) -> Option<String> {
        let before = self.text_before_caret();
        let mut lines = before.rsplit('\n');
        lines.next()?;
        let previous = lines.next()?.trim();

        if previous.starts_with("• ") {
            return Some("• ".to_string());
        }
        let number: u64 = ORDERED_ITEM.captures(previous)?[1].parse().ok()?;
        Some(format!("{}. ", number.checked_add(1)?))
    }

    /// Text on the caret's line-level siblings up to the caret, with line
    /// breaks as `\n`. Without a caret, the whole document.
    fn text_before_caret(&self) -> String {
        let mut out = String::new();
        let Some(caret) = self.selection.map(|s| s.start) else {
            line_text(&self.children, &mut out);
            return out;
        };
        if caret.node == NodeId::ROOT {
            let end = caret.offset.min(self.children.len());
            line_text(&self.children[..end], &mut out);
            return out;
        }
        let Some(path) = path_to(&self.children, caret.node) else {
            return out;
        };
        let Some((&index, parent)) = path.split_last() else {
            return out;
        };
        let siblings = children_at(&self.children, parent);
        let Some(node) = siblings.get(index) else {
            return out;
        };

        match &node.kind {
            LiveKind::Text(text) => {
                line_text(&siblings[..index], &mut out);
                out.push_str(&text[..char_to_byte(text, caret.offset)]);
            }
            LiveKind::Element { children, .. } => {
                let end = caret.offset.min(children.len());
                line_text(&children[..end], &mut out);
            }
            LiveKind::Checkbox { .. } => line_text(&siblings[..index], &mut out),
        }
        out
    }

    /// Remove `pattern` from just before the caret when the caret's text node
    /// ends with it there. An emptied text node is removed.
    fn delete_before_caret(&mut self, pattern: &str) -> bool {
        let Some(caret) = self.selection.map(|s| s.start) else {
            return false;
        };
        let Some(path) = path_to(&self.children, caret.node) else {
            return false;
        };
        let Some((&index, parent)) = path.split_last() else {
            return false;
        };
        let parent = parent.to_vec();
        let count = pattern.chars().count();
        let Some(start) = caret.offset.checked_sub(count) else {
            return false;
        };

        let emptied = with_container(&mut self.children, &parent, |container| {
            let Some(LiveNode {
                kind: LiveKind::Text(text),
                ..
            }) = container.get_mut(index)
            else {
                return None;
            };
            let from = char_to_byte(text, start);
            let to = char_to_byte(text, caret.offset);
            if &text[from..to] != pattern {
                return None;
            }
            text.replace_range(from..to, "");
            let emptied = text.is_empty();
            if emptied {
                container.remove(index);
            }
            Some(emptied)
        });

        match emptied {
            Some(true) => {
                let container = self.container_id(&parent);
                self.selection = Some(CursorPosition::caret(Position::new(container, index)));
                true
            }
            Some(false) => {
                self.selection = Some(CursorPosition::caret(Position::new(caret.node, start)));
                true
            }
            None => false,
        }
    }

    // ==== Tree helpers ====

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn adopt(&mut self, node: Node) -> LiveNode {
        let id = self.alloc_id();
        let kind = match node {
            Node::Text(text) => LiveKind::Text(text),
            Node::Checkbox(Checkbox { id, checked }) => LiveKind::Checkbox {
                id,
                checked,
                bound: false,
            },
            Node::Element(Element {
                tag,
                attrs,
                children,
            }) => LiveKind::Element {
                tag,
                attrs,
                children: children.into_iter().map(|child| self.adopt(child)).collect(),
            },
        };
        LiveNode { id, kind }
    }

    /// Host-side edit: keep the preview current, then notify.
    fn edited(&mut self) {
        self.preview = render_preview(&self.content());
        self.notify_changed();
    }

    fn notify_changed(&self) {
        if let Some(observer) = &self.observer {
            observer.view_changed();
        }
    }

    fn end_position(&self) -> Position {
        Position::new(NodeId::ROOT, self.children.len())
    }

    fn container_id(&self, path: &[usize]) -> NodeId {
        let mut nodes = &self.children;
        let mut id = NodeId::ROOT;
        for &index in path {
            match nodes.get(index) {
                Some(LiveNode {
                    id: element_id,
                    kind: LiveKind::Element { children, .. },
                }) => {
                    id = *element_id;
                    nodes = children;
                }
                _ => return NodeId::ROOT,
            }
        }
        id
    }

    /// Resolve the caret into `(container path, child index)`, splitting a text
    /// node when the caret sits inside one.
    fn insertion_point(&mut self) -> (Vec<usize>, usize) {
        let root_end = (Vec::new(), self.children.len());
        let Some(caret) = self.selection.map(|s| s.start) else {
            return root_end;
        };
        if caret.node == NodeId::ROOT {
            return (Vec::new(), caret.offset.min(self.children.len()));
        }
        let Some(mut path) = path_to(&self.children, caret.node) else {
            return root_end;
        };
        let Some(index) = path.pop() else {
            return root_end;
        };

        let split_id = self.alloc_id();
        let target = with_container(&mut self.children, &path, |container| {
            let right = match &mut container.get_mut(index)?.kind {
                LiveKind::Element { children, .. } => {
                    return Some(Target::Inside(caret.offset.min(children.len())));
                }
                LiveKind::Checkbox { .. } => return Some(Target::Before),
                LiveKind::Text(text) => {
                    let len = text.chars().count();
                    if caret.offset == 0 {
                        return Some(Target::Before);
                    } else if caret.offset >= len {
                        return Some(Target::After);
                    }
                    text.split_off(char_to_byte(text, caret.offset))
                }
            };
            container.insert(
                index + 1,
                LiveNode {
                    id: split_id,
                    kind: LiveKind::Text(right),
                },
            );
            Some(Target::After)
        });

        match target {
            Some(Target::Inside(offset)) => {
                path.push(index);
                (path, offset)
            }
            Some(Target::Before) => (path, index),
            Some(Target::After) => (path, index + 1),
            None => root_end,
        }
    }

    /// Insert `nodes` at the caret. Returns the container path and the index
    /// just after the inserted nodes.
    fn insert_nodes(&mut self, nodes: Vec<LiveNode>) -> (Vec<usize>, usize) {
        let (path, index) = self.insertion_point();
        let count = nodes.len();
        let index = with_container(&mut self.children, &path, |container| {
            let index = index.min(container.len());
            container.splice(index..index, nodes);
            index
        });
        (path, index + count)
    }
}

impl EditorView for DocumentView {
    fn content(&self) -> Vec<Node> {
        self.children.iter().map(to_node).collect()
    }

    fn replace_content(&mut self, nodes: Vec<Node>) {
        let children = nodes.into_iter().map(|node| self.adopt(node)).collect();
        self.children = children;
        self.selection = None;
        self.notify_changed();
    }

    fn bind_checkboxes(&mut self) -> usize {
        fn walk(nodes: &mut [LiveNode]) -> usize {
            let mut count = 0;
            for node in nodes {
                match &mut node.kind {
                    LiveKind::Checkbox { bound, .. } if !*bound => {
                        *bound = true;
                        count += 1;
                    }
                    LiveKind::Element { children, .. } => count += walk(children),
                    _ => {}
                }
            }
            count
        }

        walk(&mut self.children)
    }

    fn selection(&self) -> Option<CursorPosition> {
        self.selection
    }

    fn set_selection(&mut self, selection: CursorPosition) {
        if self.is_valid_position(&selection.start) && self.is_valid_position(&selection.end) {
            self.selection = Some(selection);
        } else {
            log::debug!("[DocumentView] Ignoring selection with detached anchors");
        }
    }

    fn is_valid_position(&self, position: &Position) -> bool {
        if position.node == NodeId::ROOT {
            return position.offset <= self.children.len();
        }
        match find(&self.children, position.node) {
            Some(LiveNode {
                kind: LiveKind::Text(text),
                ..
            }) => position.offset <= text.chars().count(),
            Some(LiveNode {
                kind: LiveKind::Element { children, .. },
                ..
            }) => position.offset <= children.len(),
            Some(LiveNode {
                kind: LiveKind::Checkbox { .. },
                ..
            }) => position.offset == 0,
            None => false,
        }
    }

    fn place_cursor_at_end(&mut self) {
        self.selection = Some(CursorPosition::caret(self.end_position()));
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn refresh_preview(&mut self) {
        self.preview = render_preview(&self.content());
    }

    fn set_observer(&mut self, observer: Arc<dyn ViewObserver>) {
        self.observer = Some(observer);
    }

    fn clear_observer(&mut self) {
        self.observer = None;
    }
}

// ==== Free tree functions ====

fn to_node(live: &LiveNode) -> Node {
    match &live.kind {
        LiveKind::Text(text) => Node::Text(text.clone()),
        LiveKind::Checkbox { id, checked, .. } => Node::checkbox(id.clone(), *checked),
        LiveKind::Element {
            tag,
            attrs,
            children,
        } => Node::Element(Element {
            tag: tag.clone(),
            attrs: attrs.clone(),
            children: children.iter().map(to_node).collect(),
        }),
    }
}

/// Text of `nodes` with `<br>` and `<hr>` as line breaks.
fn line_text(nodes: &[LiveNode], out: &mut String) {
    for node in nodes {
        match &node.kind {
            LiveKind::Text(text) => out.push_str(text),
            LiveKind::Element { tag, .. } if tag == "br" || tag == "hr" => out.push('\n'),
            LiveKind::Element { children, .. } => line_text(children, out),
            LiveKind::Checkbox { .. } => {}
        }
    }
}

/// Child list at `path`, stopping at the deepest element the path resolves to.
fn children_at<'a>(mut nodes: &'a [LiveNode], path: &[usize]) -> &'a [LiveNode] {
    for &index in path {
        match nodes.get(index) {
            Some(LiveNode {
                kind: LiveKind::Element { children, .. },
                ..
            }) => nodes = children,
            _ => break,
        }
    }
    nodes
}

fn find(nodes: &[LiveNode], id: NodeId) -> Option<&LiveNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let LiveKind::Element { children, .. } = &node.kind
            && let Some(found) = find(children, id)
        {
            return Some(found);
        }
    }
    None
}

fn find_mut(nodes: &mut [LiveNode], id: NodeId) -> Option<&mut LiveNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let LiveKind::Element { children, .. } = &mut node.kind
            && let Some(found) = find_mut(children, id)
        {
            return Some(found);
        }
    }
    None
}

fn path_to(nodes: &[LiveNode], id: NodeId) -> Option<Vec<usize>> {
    for (index, node) in nodes.iter().enumerate() {
        if node.id == id {
            return Some(vec![index]);
        }
        if let LiveKind::Element { children, .. } = &node.kind
            && let Some(mut rest) = path_to(children, id)
        {
            rest.insert(0, index);
            return Some(rest);
        }
    }
    None
}

/// Run `f` on the child list at `path`, stopping early at the deepest
/// element the path still resolves to.
fn with_container<R>(
    nodes: &mut Vec<LiveNode>,
    path: &[usize],
    f: impl FnOnce(&mut Vec<LiveNode>) -> R,
) -> R {
    if let Some((&index, rest)) = path.split_first()
        && let Some(LiveNode {
            kind: LiveKind::Element { children, .. },
            ..
        }) = nodes.get_mut(index)
    {
        return with_container(children, rest, f);
    }
    f(nodes)
}

fn find_checkbox(nodes: &[LiveNode], checkbox_id: &str) -> Option<(bool, bool)> {
    for node in nodes {
        match &node.kind {
            LiveKind::Checkbox { id, checked, bound } if id == checkbox_id => {
                return Some((*checked, *bound));
            }
            LiveKind::Element { children, .. } => {
                if let Some(found) = find_checkbox(children, checkbox_id) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_checkbox_mut<'a>(
    nodes: &'a mut [LiveNode],
    checkbox_id: &str,
) -> Option<(&'a mut bool, &'a mut bool)> {
    for node in nodes {
        match &mut node.kind {
            LiveKind::Checkbox { id, checked, bound } if id == checkbox_id => {
                return Some((checked, bound));
            }
            LiveKind::Element { children, .. } => {
                if let Some(found) = find_checkbox_mut(children, checkbox_id) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(byte, _)| byte)
}
