//! Shared in-process document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    ChangeCallback, Document, DocumentStore, DocumentUpdate, PageId, SubscriptionId, Subscribers,
};
use crate::editor::Snapshot;
use crate::error::{DraionError, Result};

#[derive(Default)]
struct Inner {
    pages: Mutex<HashMap<PageId, Document>>,
    subscribers: Subscribers,
    offline: AtomicBool,
}

/// A document store living in memory.
///
/// Cloning shares the same pages and subscriptions, so several clients can be
/// pointed at one store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a page (builder pattern).
    pub fn with_page(self, page_id: &PageId, name: &str, content: &str) -> Self {
        let mut document = Document::new(name);
        document.content = Snapshot::from(content);
        self.pages().insert(page_id.clone(), document);
        self
    }

    /// Current stored document (for assertions).
    pub fn get(&self, page_id: &PageId) -> Option<Document> {
        self.pages().get(page_id).cloned()
    }

    /// Make every operation fail with `StoreUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions across all pages.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.count()
    }

    fn pages(&self) -> std::sync::MutexGuard<'_, HashMap<PageId, Document>> {
        self.inner
            .pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(DraionError::store_unavailable("memory store is offline"));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    async fn read(&self, page_id: &PageId) -> Result<Option<Document>> {
        self.ensure_online()?;
        Ok(self.get(page_id))
    }

    async fn create(&self, page_id: &PageId, document: &Document) -> Result<()> {
        self.ensure_online()?;
        self.pages()
            .entry(page_id.clone())
            .or_insert_with(|| document.clone());
        Ok(())
    }

    async fn write(&self, page_id: &PageId, update: &DocumentUpdate) -> Result<()> {
        self.ensure_online()?;
        let document = {
            let mut pages = self.pages();
            let document = pages.entry(page_id.clone()).or_insert_with(|| Document {
                name: page_id.to_string(),
                content: Snapshot::empty(),
                created_at: update.last_modified,
                last_modified: update.last_modified,
            });
            document.apply(update);
            document.clone()
        };

        self.inner.subscribers.notify(page_id, &document);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(PageId, Document)>> {
        self.ensure_online()?;
        Ok(self
            .pages()
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn subscribe(&self, page_id: &PageId, callback: ChangeCallback) -> Result<SubscriptionId> {
        self.ensure_online()?;
        Ok(self.inner.subscribers.add(page_id, callback))
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.subscribers.remove(subscription);
    }
}
