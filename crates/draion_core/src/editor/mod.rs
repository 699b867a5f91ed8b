//! Editor-side model: content tree, snapshot codec, cursor tracking, the view
//! contract with its in-memory implementation, and the preview renderer.

pub mod codec;
pub mod cursor;
pub mod node;
pub mod preview;
pub mod view;

pub use codec::{Snapshot, decode, encode};
pub use cursor::{CursorPosition, NodeId, Position, RestoreOutcome};
pub use node::{Checkbox, Element, Node};
pub use preview::render_preview;
pub use view::{DocumentView, EditorView, ViewObserver};
