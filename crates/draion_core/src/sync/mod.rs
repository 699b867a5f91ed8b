//! Collaborative synchronization: debounced persistence of local edits and
//! guarded rendering of remote snapshots, one session per open page.

mod debounce;
mod engine;
mod session;

pub use debounce::Debouncer;
pub use engine::SyncEngine;
pub use session::{
    PersistOutcome, RemoteOutcome, SessionEvent, SessionHandle, SessionStats, SyncSession,
    SyncState,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a shared view, recovering from a poisoned lock.
///
/// A panic inside a view method leaves the tree in whatever state it reached;
/// the next snapshot replaces it wholesale anyway.
pub(crate) fn lock_view<V>(view: &Mutex<V>) -> MutexGuard<'_, V> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}
