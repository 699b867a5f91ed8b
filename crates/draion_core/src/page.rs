//! Page access flow: turn what the user typed into an open page.

use crate::config::PageRules;
use crate::error::Result;
use crate::store::{Document, DocumentStore, PageId};
use crate::utils::naming::validate_page_name;

/// Validate and sanitize `input`, then read the page once, creating it empty
/// when it does not exist yet.
///
/// The display name stored on a new page is the trimmed input, casing intact.
pub async fn open_or_create<S: DocumentStore>(
    store: &S,
    input: &str,
    rules: &PageRules,
) -> Result<(PageId, Document)> {
    let name = validate_page_name(input, rules)?;
    let page_id = PageId::parse(name)?;

    if let Some(document) = store.read(&page_id).await? {
        log::debug!("[Pages] Loaded {}", page_id);
        return Ok((page_id, document));
    }

    let document = Document::new(name);
    store.create(&page_id, &document).await?;
    log::info!("[Pages] Created page {} ({:?})", page_id, name);
    Ok((page_id, document))
}

/// Whether a page exists for `input`. Invalid names and store errors count as absent.
pub async fn page_exists<S: DocumentStore>(store: &S, input: &str) -> bool {
    let Ok(page_id) = PageId::parse(input) else {
        return false;
    };
    match store.read(&page_id).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            log::warn!("[Pages] Could not check {}: {}", page_id, e);
            false
        }
    }
}

/// Every page, sorted by id. Empty when the store cannot be read.
pub async fn list_pages<S: DocumentStore>(store: &S) -> Vec<(PageId, Document)> {
    match store.list().await {
        Ok(mut pages) => {
            pages.sort_by(|(a, _), (b, _)| a.cmp(b));
            pages
        }
        Err(e) => {
            log::warn!("[Pages] Could not list pages: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Snapshot;
    use crate::error::DraionError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_existing_page_is_read_not_recreated() {
        let id = PageId::parse("todo").unwrap();
        let store = MemoryStore::new().with_page(&id, "Todo", "keep me");

        let (page_id, doc) = open_or_create(&store, "TODO", &PageRules::default())
            .await
            .unwrap();
        assert_eq!(page_id, id);
        assert_eq!(doc.name, "Todo");
        assert_eq!(doc.content, Snapshot::from("keep me"));
    }

    #[tokio::test]
    async fn test_name_rules_apply_before_sanitizing() {
        let store = MemoryStore::new();
        let rules = PageRules::default();
        assert!(matches!(
            open_or_create(&store, " a ", &rules).await,
            Err(DraionError::InvalidPageName(_))
        ));
        assert!(matches!(
            open_or_create(&store, "!!!", &rules).await,
            Err(DraionError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = open_or_create(&store, "todo", &PageRules::default())
            .await
            .unwrap_err();
        assert!(err.is_store_failure());
        assert!(!page_exists(&store, "todo").await);
        assert!(list_pages(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let store = MemoryStore::new()
            .with_page(&PageId::parse("zeta").unwrap(), "Zeta", "")
            .with_page(&PageId::parse("alpha").unwrap(), "Alpha", "");

        let ids: Vec<_> = list_pages(&store)
            .await
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(page_exists(&store, "Alpha").await);
        assert!(!page_exists(&store, "beta").await);
    }
}
