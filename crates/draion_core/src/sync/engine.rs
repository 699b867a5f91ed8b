//! Sync engine: owns the (at most one) active session of a client.
//!
//! # Usage
//!
//! ```ignore
//! use draion_core::{DocumentView, MemoryStore, SyncEngine, config::SyncConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let view = Arc::new(Mutex::new(DocumentView::new()));
//! let mut engine = SyncEngine::new(store, Arc::clone(&view), SyncConfig::default());
//!
//! engine.open_page("Todo").await?;
//! view.lock().unwrap().insert_text("buy milk");
//! // ... 800ms later the page is saved
//! let stats = engine.close_session().await;
//! ```

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::session::{SessionHandle, SessionStats, SyncSession};
use crate::config::{PageRules, SyncConfig};
use crate::editor::EditorView;
use crate::error::Result;
use crate::page;
use crate::store::{Document, DocumentStore, PageId};

struct ActiveSession {
    page_id: PageId,
    handle: SessionHandle,
    task: JoinHandle<SessionStats>,
}

/// Per-client coordinator between one view and one store.
pub struct SyncEngine<S: DocumentStore, V: EditorView> {
    store: Arc<S>,
    view: Arc<Mutex<V>>,
    config: SyncConfig,
    rules: PageRules,
    active: Option<ActiveSession>,
}

impl<S: DocumentStore, V: EditorView> SyncEngine<S, V> {
    pub fn new(store: Arc<S>, view: Arc<Mutex<V>>, config: SyncConfig) -> Self {
        Self {
            store,
            view,
            config,
            rules: PageRules::default(),
            active: None,
        }
    }

    /// Use custom page name rules for [`open_page`](Self::open_page) (builder pattern).
    pub fn with_page_rules(mut self, rules: PageRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn view(&self) -> &Arc<Mutex<V>> {
        &self.view
    }

    /// Page of the running session, if any.
    pub fn active_page(&self) -> Option<&PageId> {
        self.active.as_ref().map(|active| &active.page_id)
    }

    /// Handle of the running session, if any.
    pub fn handle(&self) -> Option<&SessionHandle> {
        self.active.as_ref().map(|active| &active.handle)
    }

    /// Start syncing `page_id`, rendering `initial` first.
    ///
    /// Any previous session is closed and fully torn down before the new one
    /// attaches to the view.
    pub async fn open_session(&mut self, page_id: PageId, initial: Document) -> SessionHandle {
        if let Some(previous) = self.active_page().cloned() {
            log::info!("[SyncEngine] Switching from {} to {}", previous, page_id);
            self.close_session().await;
        }

        let (session, handle) = SyncSession::open(
            page_id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.view),
            &self.config,
            initial,
        )
        .await;
        let task = tokio::spawn(session.run());

        self.active = Some(ActiveSession {
            page_id,
            handle: handle.clone(),
            task,
        });
        handle
    }

    /// Stop the running session and wait for it to finish.
    ///
    /// Returns its counters, or `None` when nothing was open.
    pub async fn close_session(&mut self) -> Option<SessionStats> {
        let active = self.active.take()?;
        active.handle.close();
        match active.task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                log::error!("[SyncEngine] Session task for {} failed: {}", active.page_id, e);
                None
            }
        }
    }

    /// Page access flow followed by [`open_session`](Self::open_session).
    ///
    /// Validates and sanitizes `name`, reads the page once (creating it when
    /// missing) and starts syncing it.
    pub async fn open_page(&mut self, name: &str) -> Result<(PageId, Document)> {
        let (page_id, document) = page::open_or_create(self.store.as_ref(), name, &self.rules).await?;
        self.open_session(page_id.clone(), document.clone()).await;
        Ok((page_id, document))
    }
}

impl<S: DocumentStore, V: EditorView> Drop for SyncEngine<S, V> {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.handle.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DocumentView;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn engine() -> (SyncEngine<MemoryStore, DocumentView>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(Mutex::new(DocumentView::new()));
        (
            SyncEngine::new(Arc::clone(&store), view, SyncConfig::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_open_page_creates_missing() {
        let (mut engine, store) = engine();
        let (page_id, document) = engine.open_page("  Shopping List ").await.unwrap();

        assert_eq!(page_id.as_str(), "shopping_list");
        assert_eq!(document.name, "Shopping List");
        assert_eq!(engine.active_page(), Some(&page_id));
        assert!(store.get(&page_id).is_some());
    }

    #[tokio::test]
    async fn test_open_page_rejects_short_name() {
        let (mut engine, _store) = engine();
        assert!(engine.open_page("x").await.is_err());
        assert!(engine.active_page().is_none());
    }

    #[tokio::test]
    async fn test_switching_pages_closes_previous() {
        let (mut engine, store) = engine();
        let first = engine.open_page("first").await.unwrap().0;
        let old_handle = engine.handle().cloned().unwrap();
        let second = engine.open_page("second").await.unwrap().0;

        assert!(old_handle.is_closed());
        assert_eq!(engine.active_page(), Some(&second));
        assert_ne!(first, second);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_persist() {
        let (mut engine, store) = engine();
        let (page_id, _) = engine.open_page("todo").await.unwrap();

        engine.view().lock().unwrap().insert_text("never saved");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = engine.close_session().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(stats.persists_written, 0);
        assert!(store.get(&page_id).unwrap().content.is_empty());
        assert!(engine.active_page().is_none());
        assert!(engine.close_session().await.is_none());
    }
}
