//! File-backed document store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   pages/
//!     todo.json        {"name":"Todo","content":"...","createdAt":"...","lastModified":"..."}
//!     shopping_list.json
//! ```
//!
//! Change notifications are delivered to subscribers registered on this
//! instance (or its clones). Other processes writing the same directory are
//! not observed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    ChangeCallback, Document, DocumentStore, DocumentUpdate, PageId, SubscriptionId, Subscribers,
};
use crate::editor::Snapshot;
use crate::error::{DraionError, Result};
use crate::utils::naming::is_valid_page_key;

const PAGES_DIR: &str = "pages";

/// A document store keeping one JSON file per page.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    subscribers: Arc<Subscribers>,
    // Serializes read-modify-write cycles within this process.
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(PAGES_DIR)).map_err(|e| unavailable(&root, e))?;
        log::debug!("[FileStore] Opened store at {}", root.display());
        Ok(Self {
            root,
            subscribers: Arc::new(Subscribers::default()),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn page_path(&self, page_id: &PageId) -> PathBuf {
        self.root
            .join(PAGES_DIR)
            .join(format!("{}.json", page_id.as_str()))
    }

    fn load(&self, page_id: &PageId) -> Result<Option<Document>> {
        let path = self.page_path(page_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, page_id: &PageId, document: &Document) -> Result<()> {
        let path = self.page_path(page_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&tmp, json).map_err(|e| unavailable(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| unavailable(&path, e))?;
        Ok(())
    }
}

fn unavailable(path: &Path, err: io::Error) -> DraionError {
    DraionError::store_unavailable(format!("{}: {}", path.display(), err))
}

impl DocumentStore for FileStore {
    async fn read(&self, page_id: &PageId) -> Result<Option<Document>> {
        self.load(page_id)
    }

    async fn create(&self, page_id: &PageId, document: &Document) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.load(page_id)?.is_some() {
            log::debug!("[FileStore] {} already exists, not recreating", page_id);
            return Ok(());
        }
        self.save(page_id, document)?;
        log::info!("[FileStore] Created {}", page_id);
        Ok(())
    }

    async fn write(&self, page_id: &PageId, update: &DocumentUpdate) -> Result<()> {
        let document = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut document = self.load(page_id)?.unwrap_or_else(|| Document {
                name: page_id.to_string(),
                content: Snapshot::empty(),
                created_at: update.last_modified,
                last_modified: update.last_modified,
            });
            document.apply(update);
            self.save(page_id, &document)?;
            document
        };

        log::debug!(
            "[FileStore] Wrote {} ({} bytes)",
            page_id,
            document.content.as_str().len()
        );
        self.subscribers.notify(page_id, &document);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(PageId, Document)>> {
        let dir = self.root.join(PAGES_DIR);
        let entries = fs::read_dir(&dir).map_err(|e| unavailable(&dir, e))?;

        let mut pages = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| unavailable(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            // Only files this store wrote; anything else is not ours to rename.
            if !is_valid_page_key(stem) {
                log::debug!("[FileStore] Ignoring {}", path.display());
                continue;
            }
            let Ok(page_id) = PageId::parse(stem) else {
                continue;
            };
            match self.load(&page_id) {
                Ok(Some(document)) => pages.push((page_id, document)),
                Ok(None) => {}
                Err(e) => log::warn!("[FileStore] Skipping unreadable page {}: {}", stem, e),
            }
        }
        Ok(pages)
    }

    async fn subscribe(&self, page_id: &PageId, callback: ChangeCallback) -> Result<SubscriptionId> {
        Ok(self.subscribers.add(page_id, callback))
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) {
        if !self.subscribers.remove(subscription) {
            log::debug!("[FileStore] Unknown subscription {:?}", subscription);
        }
    }
}
