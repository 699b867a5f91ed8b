//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use draion_core::config::SyncConfig;
use draion_core::editor::{CursorPosition, EditorView};
use draion_core::store::{ChangeCallback, SubscriptionId};
use draion_core::{
    Document, DocumentStore, DocumentUpdate, DocumentView, DraionError, MemoryStore, PageId,
    Result, Snapshot, SyncEngine,
};

/// One editing client: a view plus the engine syncing it.
pub struct Client<S: DocumentStore> {
    pub engine: SyncEngine<S, DocumentView>,
    pub view: Arc<Mutex<DocumentView>>,
}

impl<S: DocumentStore> Client<S> {
    pub fn new(store: Arc<S>) -> Self {
        let view = Arc::new(Mutex::new(DocumentView::new()));
        let engine = SyncEngine::new(store, Arc::clone(&view), SyncConfig::default());
        Self { engine, view }
    }

    pub async fn open(&mut self, name: &str) -> PageId {
        self.engine.open_page(name).await.unwrap().0
    }

    pub fn type_text(&self, text: &str) {
        self.view.lock().unwrap().insert_text(text);
    }

    pub fn insert_checkbox(&self) -> String {
        self.view.lock().unwrap().insert_checkbox()
    }

    pub fn toggle(&self, checkbox_id: &str) -> bool {
        self.view.lock().unwrap().toggle_checkbox(checkbox_id)
    }

    pub fn snapshot(&self) -> String {
        self.view.lock().unwrap().snapshot().into_string()
    }

    pub fn text(&self) -> String {
        self.view.lock().unwrap().text_content()
    }

    pub fn selection(&self) -> Option<CursorPosition> {
        self.view.lock().unwrap().selection()
    }
}

/// Let spawned session tasks run for `ms` of (paused) time.
pub async fn wait_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// A shared memory store that records writes and can be switched offline
/// for writes only.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: Arc<Mutex<Vec<Snapshot>>>,
    failing: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<Snapshot> {
        self.writes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn stored(&self, page_id: &PageId) -> Option<Document> {
        self.inner.get(page_id)
    }
}

impl DocumentStore for CountingStore {
    async fn read(&self, page_id: &PageId) -> Result<Option<Document>> {
        self.inner.read(page_id).await
    }

    async fn create(&self, page_id: &PageId, document: &Document) -> Result<()> {
        self.inner.create(page_id, document).await
    }

    async fn write(&self, page_id: &PageId, update: &DocumentUpdate) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DraionError::store_unavailable("connection lost"));
        }
        self.writes.lock().unwrap().push(update.content.clone());
        self.inner.write(page_id, update).await
    }

    async fn list(&self) -> Result<Vec<(PageId, Document)>> {
        self.inner.list().await
    }

    async fn subscribe(&self, page_id: &PageId, callback: ChangeCallback) -> Result<SubscriptionId> {
        self.inner.subscribe(page_id, callback).await
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.unsubscribe(subscription).await
    }
}
