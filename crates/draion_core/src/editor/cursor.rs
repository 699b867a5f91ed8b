//! Cursor state tracking across content replacement.
//!
//! Positions reference live node ids owned by the view. A full content
//! replacement gives every node a fresh id, so a saved position either still
//! resolves (nothing was replaced in between) or it is stale and the caret
//! falls back to the end of the document.

use super::view::EditorView;

/// Identity of a node in a live view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The view's root container. Never detached.
    pub const ROOT: NodeId = NodeId(0);
}

/// A caret anchor: a node and an offset inside it.
///
/// For text nodes the offset counts characters; for containers it counts
/// children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A selection range. Collapsed when `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub start: Position,
    pub end: Position,
}

impl CursorPosition {
    /// A collapsed caret at `at`.
    pub fn caret(at: Position) -> Self {
        Self { start: at, end: at }
    }
}

/// Result of restoring a saved cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The saved selection was applied as-is.
    Restored,
    /// The saved selection was missing or stale; the caret is at the document end.
    MovedToEnd,
}

/// Capture the view's current selection, if it has one.
pub fn capture<V: EditorView + ?Sized>(view: &V) -> Option<CursorPosition> {
    view.selection()
}

/// Re-apply a saved selection.
///
/// Returns false and leaves the selection untouched when either anchor no
/// longer resolves in the view.
pub fn restore<V: EditorView + ?Sized>(view: &mut V, saved: &CursorPosition) -> bool {
    if !view.is_valid_position(&saved.start) || !view.is_valid_position(&saved.end) {
        return false;
    }
    view.set_selection(*saved);
    true
}

/// Restore `saved`, or collapse the caret at the document end and focus the editor.
pub fn restore_or_end<V: EditorView + ?Sized>(
    view: &mut V,
    saved: Option<&CursorPosition>,
) -> RestoreOutcome {
    if let Some(saved) = saved
        && restore(view, saved)
    {
        return RestoreOutcome::Restored;
    }

    view.place_cursor_at_end();
    view.focus();
    RestoreOutcome::MovedToEnd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::node::Node;
    use crate::editor::view::DocumentView;

    fn view_with(text: &str) -> DocumentView {
        let mut view = DocumentView::new();
        view.replace_content(vec![Node::text(text)]);
        view
    }

    #[test]
    fn test_capture_and_restore_without_replacement() {
        let mut view = view_with("hello");
        let text_node = view.node_ids()[0];
        view.set_caret(Position::new(text_node, 3));

        let saved = capture(&view).unwrap();
        view.place_cursor_at_end();
        assert!(restore(&mut view, &saved));
        assert_eq!(view.selection(), Some(saved));
    }

    #[test]
    fn test_restore_rejects_out_of_range_offset() {
        let mut view = view_with("hi");
        let text_node = view.node_ids()[0];
        let bogus = CursorPosition::caret(Position::new(text_node, 10));

        assert!(!restore(&mut view, &bogus));
        assert_eq!(view.selection(), None);
    }

    #[test]
    fn test_stale_cursor_moves_to_end() {
        let mut view = view_with("first");
        let text_node = view.node_ids()[0];
        view.set_caret(Position::new(text_node, 2));
        let saved = capture(&view);

        view.replace_content(vec![Node::text("second"), Node::line_break()]);
        let outcome = restore_or_end(&mut view, saved.as_ref());

        assert_eq!(outcome, RestoreOutcome::MovedToEnd);
        assert!(view.is_focused());
        assert_eq!(
            view.selection(),
            Some(CursorPosition::caret(Position::new(NodeId::ROOT, 2)))
        );
    }

    #[test]
    fn test_no_saved_cursor_moves_to_end() {
        let mut view = view_with("text");
        assert_eq!(restore_or_end(&mut view, None), RestoreOutcome::MovedToEnd);
        assert_eq!(
            view.selection(),
            Some(CursorPosition::caret(Position::new(NodeId::ROOT, 1)))
        );
    }

    #[test]
    fn test_root_is_always_valid() {
        let view = DocumentView::new();
        assert!(view.is_valid_position(&Position::new(NodeId::ROOT, 0)));
        assert!(!view.is_valid_position(&Position::new(NodeId::ROOT, 1)));
    }
}
