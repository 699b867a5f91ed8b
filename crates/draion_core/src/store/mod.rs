//! Document store abstraction.
//!
//! A store holds named documents and notifies subscribers whenever one of
//! them is written. Every write notifies every subscriber of that page,
//! including the client that made it; sessions recognise their own echoes by
//! content equality.
//!
//! Implementations:
//! - [`MemoryStore`]: shared in-process store (tests, embedding)
//! - [`FileStore`]: one JSON file per page on disk

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::editor::Snapshot;
use crate::error::{DraionError, Result};
use crate::utils::naming::sanitize_page_name;

/// Sanitized page identifier: `[a-z0-9_-]+`, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Sanitize user input into an identifier.
    ///
    /// Fails with [`DraionError::InvalidIdentifier`] when nothing usable remains.
    pub fn parse(input: &str) -> Result<Self> {
        let key = sanitize_page_name(input);
        if key.is_empty() {
            return Err(DraionError::InvalidIdentifier(input.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PageId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        PageId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A stored page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Display name exactly as the user typed it (trimmed).
    pub name: String,
    /// Serialized page content.
    pub content: Snapshot,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// A brand-new empty page.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            content: Snapshot::empty(),
            created_at: now,
            last_modified: now,
        }
    }

    /// Apply a partial update.
    pub fn apply(&mut self, update: &DocumentUpdate) {
        self.content = update.content.clone();
        self.last_modified = update.last_modified;
    }
}

/// Partial write issued by a sync session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub content: Snapshot,
    pub last_modified: DateTime<Utc>,
}

impl DocumentUpdate {
    /// An update stamped with the current time.
    pub fn now(content: Snapshot) -> Self {
        Self {
            content,
            last_modified: Utc::now(),
        }
    }
}

/// Handle returned by [`DocumentStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked with the full document after each write.
///
/// Called from whatever task performed the write; it must not block.
pub type ChangeCallback = Arc<dyn Fn(Document) + Send + Sync>;

/// Remote document store contract.
pub trait DocumentStore: Send + Sync + 'static {
    /// Read a page once. `Ok(None)` when it does not exist.
    fn read(&self, page_id: &PageId) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Create a page. Overwrites nothing if it already exists.
    fn create(&self, page_id: &PageId, document: &Document)
    -> impl Future<Output = Result<()>> + Send;

    /// Write content and modification time, creating the page if needed.
    /// Notifies every subscriber of the page.
    fn write(
        &self,
        page_id: &PageId,
        update: &DocumentUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Every stored page.
    fn list(&self) -> impl Future<Output = Result<Vec<(PageId, Document)>>> + Send;

    /// Register `callback` for changes to `page_id`.
    fn subscribe(
        &self,
        page_id: &PageId,
        callback: ChangeCallback,
    ) -> impl Future<Output = Result<SubscriptionId>> + Send;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, subscription: SubscriptionId) -> impl Future<Output = ()> + Send;
}

// ==== Subscriber registry shared by the in-process stores ====

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    entries: HashMap<SubscriptionId, (PageId, ChangeCallback)>,
}

/// Page subscriptions with in-process fan-out.
#[derive(Default)]
pub(crate) struct Subscribers {
    inner: Mutex<RegistryInner>,
}

impl Subscribers {
    pub(crate) fn add(&self, page_id: &PageId, callback: ChangeCallback) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.entries.insert(id, (page_id.clone(), callback));
        id
    }

    pub(crate) fn remove(&self, subscription: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.remove(&subscription).is_some()
    }

    pub(crate) fn count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    /// Call every callback registered for `page_id`. The registry lock is
    /// released before any callback runs.
    pub(crate) fn notify(&self, page_id: &PageId, document: &Document) {
        let callbacks: Vec<ChangeCallback> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .entries
                .values()
                .filter(|(page, _)| page == page_id)
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };

        for callback in callbacks {
            callback(document.clone());
        }
    }
}
