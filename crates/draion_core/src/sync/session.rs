//! Per-page sync session.
//!
//! A `SyncSession` sits between one editor view and the document store for a
//! single open page. It is driven by one task ([`SyncSession::run`]) that
//! consumes events in order:
//!
//! ```text
//!   EditorView ──view_changed / checkbox_toggled──▶ SessionHandle ──┐
//!                                                                   ▼
//!   DocumentStore ──change callback──────────────────────────▶ event queue
//!                                                                   │
//!                                                        SyncSession::run
//!                                                      ┌────────────┴───────────┐
//!                                                debounce → persist     echo check → apply
//! ```
//!
//! # Loop suppression
//!
//! While a remote snapshot is being rendered the shared `receiving` flag is
//! set. The handle drops view notifications raised during that window, and
//! the session ignores any that were already queued. Writes therefore only
//! ever originate from real local edits.
//!
//! # Echoes
//!
//! The store notifies every subscriber of a write, including the writer. An
//! incoming snapshot equal to the current view encoding or to the last
//! snapshot this session wrote or applied is treated as an echo and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::debounce::Debouncer;
use super::lock_view;
use crate::config::SyncConfig;
use crate::editor::cursor::{self, CursorPosition, RestoreOutcome};
use crate::editor::{EditorView, Snapshot, ViewObserver, codec};
use crate::store::{ChangeCallback, Document, DocumentStore, DocumentUpdate, PageId, SubscriptionId};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing pending.
    Idle,
    /// A debounce timer is armed.
    LocalEditPending,
    /// A write to the store is in flight.
    Persisting,
    /// A remote snapshot is being rendered; local notifications are suppressed.
    ApplyingRemote,
    /// Torn down. Terminal.
    Closed,
}

/// Events consumed by the session task.
#[derive(Debug)]
pub enum SessionEvent {
    LocalEdit,
    CheckboxToggled(String),
    RemoteChange(Document),
    Close,
}

/// Result of a persistence attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The view encodes to what was last written or applied; nothing sent.
    Unchanged,
    Written,
    /// The store rejected the write. Logged; retried on the next debounce cycle.
    Failed,
}

/// Result of handling a remote change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    SelfEcho,
    Applied,
}

/// Counters reported when a session closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub persists_written: u64,
    pub persists_skipped: u64,
    pub write_failures: u64,
    pub remote_applied: u64,
    pub echoes_ignored: u64,
}

/// Cheap, cloneable front door to a running session.
///
/// Installed as the view's observer. Checks the receiving guard before
/// queueing anything, so renders of remote content never come back as edits.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    receiving: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Ask the session to shut down. Returns false if it already has.
    pub fn close(&self) -> bool {
        self.tx.send(SessionEvent::Close).is_ok()
    }

    /// Whether the session task is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether a remote snapshot is being rendered right now.
    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    fn enqueue(&self, event: SessionEvent) {
        if self.is_receiving() {
            log::trace!("[SyncSession] Dropping {:?} raised while receiving", event);
            return;
        }
        // A closed session simply stops listening.
        let _ = self.tx.send(event);
    }
}

impl ViewObserver for SessionHandle {
    fn view_changed(&self) {
        self.enqueue(SessionEvent::LocalEdit);
    }

    fn checkbox_toggled(&self, checkbox_id: &str) {
        self.enqueue(SessionEvent::CheckboxToggled(checkbox_id.to_string()));
    }
}

enum Step {
    Event(Option<SessionEvent>),
    TextDue,
    CheckboxDue,
}

/// Synchronization state for one open page on one client.
pub struct SyncSession<S: DocumentStore, V: EditorView> {
    page_id: PageId,
    store: Arc<S>,
    view: Arc<Mutex<V>>,
    state: SyncState,
    last_local_content: Option<Snapshot>,
    receiving: Arc<AtomicBool>,
    text_debounce: Debouncer,
    checkbox_debounce: Debouncer,
    last_cursor: Option<CursorPosition>,
    subscription: Option<SubscriptionId>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    stats: SessionStats,
}

impl<S: DocumentStore, V: EditorView> SyncSession<S, V> {
    /// Attach to `view`, render `initial`, then subscribe to remote changes.
    ///
    /// The subscription is in place before the initial apply completes, so
    /// only writes between the caller's read and this call go unseen.
    ///
    /// A failed subscription is logged; the session still persists local edits.
    pub async fn open(
        page_id: PageId,
        store: Arc<S>,
        view: Arc<Mutex<V>>,
        config: &SyncConfig,
        initial: Document,
    ) -> (Self, SessionHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        let receiving = Arc::new(AtomicBool::new(false));
        let handle = SessionHandle {
            tx: tx.clone(),
            receiving: Arc::clone(&receiving),
        };

        let mut session = Self {
            page_id,
            store,
            view,
            state: SyncState::Idle,
            last_local_content: None,
            receiving,
            text_debounce: Debouncer::new(config.text_debounce()),
            checkbox_debounce: Debouncer::new(config.checkbox_debounce()),
            last_cursor: None,
            subscription: None,
            events,
            stats: SessionStats::default(),
        };

        lock_view(&session.view).set_observer(Arc::new(handle.clone()));
        let snapshot = canonical(&initial.content);
        session.render_snapshot(&snapshot);

        // Subscribe while the render settles; changes from here on are queued.
        let callback: ChangeCallback = Arc::new(move |document: Document| {
            let _ = tx.send(SessionEvent::RemoteChange(document));
        });
        match session.store.subscribe(&session.page_id, callback).await {
            Ok(id) => session.subscription = Some(id),
            Err(e) => log::warn!(
                "[SyncSession] Could not subscribe to {}, remote changes will not be shown: {}",
                session.page_id,
                e
            ),
        }
        session.finish_apply(snapshot).await;

        log::info!("[SyncSession] Opened {}", session.page_id);
        (session, handle)
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Last snapshot written or applied by this session.
    pub fn last_local_content(&self) -> Option<&Snapshot> {
        self.last_local_content.as_ref()
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    /// Process events until closed. Returns the session's counters.
    pub async fn run(mut self) -> SessionStats {
        loop {
            let step = tokio::select! {
                biased;
                event = self.events.recv() => Step::Event(event),
                () = self.text_debounce.fired() => Step::TextDue,
                () = self.checkbox_debounce.fired() => Step::CheckboxDue,
            };

            match step {
                Step::Event(Some(SessionEvent::LocalEdit)) => self.on_local_edit(),
                Step::Event(Some(SessionEvent::CheckboxToggled(id))) => {
                    self.on_checkbox_toggle(&id)
                }
                Step::Event(Some(SessionEvent::RemoteChange(document))) => {
                    self.on_remote_change(document).await;
                }
                Step::Event(Some(SessionEvent::Close)) | Step::Event(None) => break,
                Step::TextDue => {
                    log::trace!("[SyncSession] Text debounce elapsed for {}", self.page_id);
                    self.persist().await;
                }
                Step::CheckboxDue => {
                    log::trace!("[SyncSession] Checkbox debounce elapsed for {}", self.page_id);
                    self.persist().await;
                }
            }
        }

        self.close().await;
        self.stats
    }

    /// A local edit happened: remember the caret and restart the text debouncer.
    pub fn on_local_edit(&mut self) {
        if !self.accepts_local_events() {
            return;
        }
        self.last_cursor = cursor::capture(&*lock_view(&self.view));
        self.text_debounce.reset();
        self.state = SyncState::LocalEditPending;
    }

    /// A checkbox was toggled: restart the checkbox debouncer only.
    pub fn on_checkbox_toggle(&mut self, checkbox_id: &str) {
        if !self.accepts_local_events() {
            return;
        }
        log::debug!("[SyncSession] Checkbox {} toggled on {}", checkbox_id, self.page_id);
        self.checkbox_debounce.reset();
        self.state = SyncState::LocalEditPending;
    }

    /// Write the current view to the store unless it is unchanged.
    pub async fn persist(&mut self) -> PersistOutcome {
        if self.state == SyncState::Closed {
            return PersistOutcome::Unchanged;
        }
        self.state = SyncState::Persisting;
        let content = codec::encode(&lock_view(&self.view).content());

        let outcome = if self.last_local_content.as_ref() == Some(&content) {
            log::trace!("[SyncSession] {} unchanged, skipping write", self.page_id);
            self.stats.persists_skipped += 1;
            PersistOutcome::Unchanged
        } else {
            let update = DocumentUpdate::now(content.clone());
            match self.store.write(&self.page_id, &update).await {
                Ok(()) => {
                    log::debug!(
                        "[SyncSession] Saved {} ({} bytes)",
                        self.page_id,
                        content.as_str().len()
                    );
                    self.last_local_content = Some(content);
                    self.stats.persists_written += 1;
                    PersistOutcome::Written
                }
                Err(e) => {
                    log::warn!("[SyncSession] Failed to save {}: {}", self.page_id, e);
                    self.stats.write_failures += 1;
                    PersistOutcome::Failed
                }
            }
        };

        self.settle();
        outcome
    }

    /// Handle a change notification from the store.
    pub async fn on_remote_change(&mut self, document: Document) -> RemoteOutcome {
        if self.state == SyncState::Closed {
            return RemoteOutcome::SelfEcho;
        }
        let incoming = canonical(&document.content);
        let current = codec::encode(&lock_view(&self.view).content());

        if incoming == current || self.last_local_content.as_ref() == Some(&incoming) {
            log::trace!("[SyncSession] Ignoring echo on {}", self.page_id);
            self.stats.echoes_ignored += 1;
            return RemoteOutcome::SelfEcho;
        }

        self.apply_snapshot(incoming).await;
        self.stats.remote_applied += 1;
        RemoteOutcome::Applied
    }

    /// Cancel timers, unsubscribe and detach from the view.
    ///
    /// Pending edits that have not reached their debounce deadline are dropped.
    pub async fn close(&mut self) {
        if self.state == SyncState::Closed {
            return;
        }
        if self.text_debounce.is_pending() || self.checkbox_debounce.is_pending() {
            log::debug!(
                "[SyncSession] Discarding pending edits on {} at close",
                self.page_id
            );
        }
        self.text_debounce.cancel();
        self.checkbox_debounce.cancel();

        if let Some(subscription) = self.subscription.take() {
            self.store.unsubscribe(subscription).await;
        }
        lock_view(&self.view).clear_observer();
        self.events.close();
        self.state = SyncState::Closed;

        log::info!(
            "[SyncSession] Closed {} ({} saved, {} skipped, {} failed, {} applied, {} echoes)",
            self.page_id,
            self.stats.persists_written,
            self.stats.persists_skipped,
            self.stats.write_failures,
            self.stats.remote_applied,
            self.stats.echoes_ignored
        );
    }

    // ==== Remote apply ====

    async fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.render_snapshot(&snapshot);
        self.finish_apply(snapshot).await;
    }

    /// First half of an apply: raise the guard and replace the view content.
    fn render_snapshot(&mut self, snapshot: &Snapshot) {
        self.receiving.store(true, Ordering::SeqCst);
        self.state = SyncState::ApplyingRemote;

        let mut view = lock_view(&self.view);
        self.last_cursor = cursor::capture(&*view);
        view.replace_content(codec::decode(snapshot));
        let bound = view.bind_checkboxes();
        view.refresh_preview();
        log::debug!(
            "[SyncSession] Rendered {} ({} checkboxes bound)",
            self.page_id,
            bound
        );
    }

    /// Second half: restore the cursor once the render settled, then drop the guard.
    async fn finish_apply(&mut self, snapshot: Snapshot) {
        tokio::task::yield_now().await;

        let restored = {
            let mut view = lock_view(&self.view);
            cursor::restore_or_end(&mut *view, self.last_cursor.as_ref())
        };
        if restored == RestoreOutcome::MovedToEnd {
            log::trace!("[SyncSession] Cursor moved to end of {}", self.page_id);
        }

        self.last_local_content = Some(snapshot);
        self.receiving.store(false, Ordering::SeqCst);
        self.settle();
    }

    fn accepts_local_events(&self) -> bool {
        if self.state == SyncState::Closed {
            return false;
        }
        if self.is_receiving() {
            log::trace!("[SyncSession] Ignoring local event while receiving");
            return false;
        }
        true
    }

    fn settle(&mut self) {
        self.state = if self.text_debounce.is_pending() || self.checkbox_debounce.is_pending() {
            SyncState::LocalEditPending
        } else {
            SyncState::Idle
        };
    }
}

/// Re-encode a snapshot so equality checks compare canonical forms.
fn canonical(snapshot: &Snapshot) -> Snapshot {
    codec::encode(&codec::decode(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{DocumentView, Node};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn todo() -> PageId {
        PageId::parse("todo").unwrap()
    }

    fn initial(content: &str) -> Document {
        let mut doc = Document::new("Todo");
        doc.content = Snapshot::from(content);
        doc
    }

    async fn open_on<S: DocumentStore>(
        store: Arc<S>,
        content: &str,
    ) -> (SyncSession<S, DocumentView>, SessionHandle, Arc<Mutex<DocumentView>>) {
        let view = Arc::new(Mutex::new(DocumentView::new()));
        let (session, handle) = SyncSession::open(
            todo(),
            store,
            Arc::clone(&view),
            &SyncConfig::default(),
            initial(content),
        )
        .await;
        (session, handle, view)
    }

    #[tokio::test]
    async fn test_open_renders_initial_and_subscribes() {
        let store = Arc::new(MemoryStore::new());
        let (session, _handle, view) = open_on(Arc::clone(&store), "<b>hi</b>").await;

        assert_eq!(view.lock().unwrap().snapshot().as_str(), "<b>hi</b>");
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.last_local_content(), Some(&Snapshot::from("<b>hi</b>")));
        assert_eq!(store.subscriber_count(), 1);
        assert!(!session.is_receiving());
    }

    #[tokio::test]
    async fn test_unchanged_view_is_not_written() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, _view) = open_on(Arc::clone(&store), "same").await;

        assert_eq!(session.persist().await, PersistOutcome::Unchanged);
        assert!(store.get(&todo()).is_none());
        assert_eq!(session.stats().persists_skipped, 1);
    }

    #[tokio::test]
    async fn test_persist_writes_and_records() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;

        view.lock().unwrap().insert_text("buy milk");
        session.on_local_edit();
        assert_eq!(session.state(), SyncState::LocalEditPending);

        assert_eq!(session.persist().await, PersistOutcome::Written);
        assert_eq!(store.get(&todo()).unwrap().content.as_str(), "buy milk");
        assert_eq!(session.last_local_content(), Some(&Snapshot::from("buy milk")));
        // Text debouncer is still armed because persist was called directly.
        assert_eq!(session.state(), SyncState::LocalEditPending);
    }

    #[tokio::test]
    async fn test_self_echo_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;

        view.lock().unwrap().insert_text("mine");
        session.persist().await;
        let echo = store.get(&todo()).unwrap();

        assert_eq!(session.on_remote_change(echo).await, RemoteOutcome::SelfEcho);
        assert_eq!(session.stats().echoes_ignored, 1);
        assert_eq!(session.stats().remote_applied, 0);
    }

    #[tokio::test]
    async fn test_remote_apply_suppresses_local_notifications() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, handle, view) = open_on(Arc::clone(&store), "old").await;

        let outcome = session.on_remote_change(initial("<div>new</div>")).await;
        assert_eq!(outcome, RemoteOutcome::Applied);
        assert!(!handle.is_receiving());

        // The replacement notified the handle while the guard was up; nothing was queued.
        assert!(session.events.try_recv().is_err());
        assert_eq!(view.lock().unwrap().snapshot().as_str(), "<div>new</div>");
        assert!(view.lock().unwrap().is_focused());
        assert_eq!(session.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_local_events_ignored_while_receiving() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, _view) = open_on(Arc::clone(&store), "").await;

        session.receiving.store(true, Ordering::SeqCst);
        session.on_local_edit();
        session.on_checkbox_toggle("checkbox_1");
        assert!(!session.text_debounce.is_pending());
        assert!(!session.checkbox_debounce.is_pending());
    }

    #[tokio::test]
    async fn test_checkbox_toggle_leaves_text_debounce_alone() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, _view) = open_on(Arc::clone(&store), "").await;

        session.on_checkbox_toggle("checkbox_1");
        assert!(session.checkbox_debounce.is_pending());
        assert!(!session.text_debounce.is_pending());
    }

    #[tokio::test]
    async fn test_write_failure_is_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;

        store.set_offline(true);
        view.lock().unwrap().insert_text("draft");
        assert_eq!(session.persist().await, PersistOutcome::Failed);
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.last_local_content(), Some(&Snapshot::empty()));

        store.set_offline(false);
        assert_eq!(session.persist().await, PersistOutcome::Written);
        assert_eq!(session.stats().write_failures, 1);
        assert_eq!(session.stats().persists_written, 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;
        store.set_offline(false);

        assert!(session.subscription.is_none());
        assert_eq!(store.subscriber_count(), 0);
        view.lock().unwrap().insert_text("still saved");
        assert_eq!(session.persist().await, PersistOutcome::Written);
    }

    #[tokio::test]
    async fn test_close_detaches_everything() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, handle, view) = open_on(Arc::clone(&store), "").await;

        session.on_local_edit();
        session.close().await;

        assert_eq!(session.state(), SyncState::Closed);
        assert!(!session.text_debounce.is_pending());
        assert_eq!(store.subscriber_count(), 0);
        assert!(handle.is_closed());

        // Edits after close go nowhere.
        view.lock().unwrap().insert_text("late");
        assert_eq!(session.persist().await, PersistOutcome::Unchanged);
        assert!(store.get(&todo()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_coalesces_burst_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&writes);
        store
            .subscribe(
                &todo(),
                Arc::new(move |document: Document| sink.lock().unwrap().push(document.content)),
            )
            .await
            .unwrap();

        let (session, handle, view) = open_on(Arc::clone(&store), "").await;
        let task = tokio::spawn(session.run());

        for word in ["a", "b", "c"] {
            view.lock().unwrap().insert_text(word);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(*writes.lock().unwrap(), vec![Snapshot::from("abc")]);

        handle.close();
        let stats = task.await.unwrap();
        assert_eq!(stats.persists_written, 1);
        assert_eq!(stats.echoes_ignored, 1);
    }

    #[tokio::test]
    async fn test_initial_checkboxes_are_bound() {
        let store = Arc::new(MemoryStore::new());
        let content = r#"<input type="checkbox" id="c1" checked>  done"#;
        let (_session, _handle, view) = open_on(Arc::clone(&store), content).await;

        let view = view.lock().unwrap();
        assert_eq!(view.is_checkbox_bound("c1"), Some(true));
        assert_eq!(view.checkbox_state("c1"), Some(true));
        assert!(view.preview_html().contains("checked"));
        assert_eq!(
            view.content(),
            vec![Node::checkbox("c1", true), Node::text("  done")]
        );
    }
    #[tokio::test]
    async fn test_later_remote_snapshot_wins() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;
        let a = Snapshot::from("<div>from a</div>");
        let b = Snapshot::from("<div>from b</div>");

        let first = session.on_remote_change(initial(a.as_str())).await;
        let second = session.on_remote_change(initial(b.as_str())).await;

        assert_eq!(first, RemoteOutcome::Applied);
        assert_eq!(second, RemoteOutcome::Applied);
        assert_eq!(view.lock().unwrap().snapshot(), b);
        assert_eq!(session.last_local_content(), Some(&b));
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.stats().remote_applied, 2);
    }

    #[tokio::test]
    async fn test_stale_copy_of_last_written_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _handle, view) = open_on(Arc::clone(&store), "").await;

        view.lock().unwrap().insert_text("mine");
        session.persist().await;
        view.lock().unwrap().insert_text("!");

        // A late delivery of what this session already wrote.
        let outcome = session.on_remote_change(initial("mine")).await;
        assert_eq!(outcome, RemoteOutcome::SelfEcho);
        assert_eq!(view.lock().unwrap().snapshot().as_str(), "mine!");

        let outcome = session.on_remote_change(initial("theirs")).await;
        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(view.lock().unwrap().snapshot().as_str(), "theirs");
        assert_eq!(session.last_local_content(), Some(&Snapshot::from("theirs")));
    }

    #[tokio::test]
    async fn test_write_during_initial_render_is_queued() {
        let store = Arc::new(MemoryStore::new().with_page(&todo(), "Todo", "old"));
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .write(&todo(), &DocumentUpdate::now(Snapshot::from("new")))
                    .await
                    .unwrap();
            })
        };

        let (mut session, _handle, view) = open_on(Arc::clone(&store), "old").await;
        writer.await.unwrap();

        let Ok(SessionEvent::RemoteChange(document)) = session.events.try_recv() else {
            panic!("the write was not delivered to the new session");
        };
        assert_eq!(session.on_remote_change(document).await, RemoteOutcome::Applied);
        assert_eq!(view.lock().unwrap().snapshot().as_str(), "new");
    }
}
