//! # `draion_core`
//!
//! Shared code for Draion clients: a collaborative page editor where several
//! clients edit the same page through a remote document store.
//!
//! The heart of the crate is the sync engine. For each open page it persists
//! local edits after a quiet period, renders remote snapshots without echoing
//! them back, and keeps the caret where the user left it (or at the end of the
//! page when that spot no longer exists). Conflicts resolve last-writer-wins
//! on whole snapshots.
//!
//! ```text
//! local edit ──▶ EditorView ──▶ SyncSession (debounce) ──▶ codec ──▶ DocumentStore::write
//! DocumentStore change ──▶ SyncSession (echo check) ──▶ cursor capture ──▶ replace ──▶ cursor restore
//! ```

/// Configuration file and defaults
pub mod config;

/// Editor tree, snapshot codec, cursor tracking, views and preview
pub mod editor;

/// Error type
pub mod error;

/// Page access flow (open or create by name, listing)
pub mod page;

/// Document store trait and implementations
pub mod store;

/// Sync sessions and the engine that owns them
pub mod sync;

/// Naming and date helpers
pub mod utils;

pub use config::Config;
pub use editor::{DocumentView, EditorView, Snapshot, ViewObserver};
pub use error::{DraionError, Result};
pub use store::{Document, DocumentStore, DocumentUpdate, FileStore, MemoryStore, PageId};
pub use sync::{SessionHandle, SessionStats, SyncEngine, SyncSession, SyncState};
