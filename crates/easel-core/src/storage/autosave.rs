//! Debounced persistence of committed document state.
//!
//! [`crate::history::HistoryManager`] calls its persistence hook on every
//! commit. [`AutoSaveManager::hook`] hands out a hook that only records the
//! latest payload; the manager writes it to storage when
//! [`AutoSaveManager::maybe_save`] finds the interval has elapsed.

use super::{Storage, StorageError, StorageResult};
use crate::history::{PersistPayload, PersistenceHook};
use serde::Deserialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key under which the most recent document is also saved.
pub const LAST_DOCUMENT_KEY: &str = "__last_document__";

#[derive(Debug, Default)]
struct Pending {
    payload: Option<PersistPayload>,
    dirty: bool,
}

impl Pending {
    fn record(&mut self, payload: &PersistPayload) {
        self.payload = Some(payload.clone());
        self.dirty = true;
    }
}

/// Persistence hook that feeds an [`AutoSaveManager`].
#[derive(Debug, Clone)]
pub struct AutoSaveHook {
    pending: Rc<RefCell<Pending>>,
}

impl PersistenceHook for AutoSaveHook {
    fn persist(&mut self, payload: &PersistPayload) {
        self.pending.borrow_mut().record(payload);
    }
}

/// Only the id is needed to key a serialized document.
#[derive(Deserialize)]
struct DocumentId {
    id: String,
}

pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    pending: Rc<RefCell<Pending>>,
    /// Overrides the id stored inside the document.
    document_id: Option<String>,
}

impl<S: Storage> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            pending: Rc::default(),
            document_id: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A hook sharing this manager's pending state.
    pub fn hook(&self) -> AutoSaveHook {
        AutoSaveHook {
            pending: Rc::clone(&self.pending),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.borrow().dirty
    }

    pub fn set_document_id(&mut self, id: Option<String>) {
        self.document_id = id;
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Dirty and the interval has elapsed since the last save.
    pub fn should_save(&self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save if [`Self::should_save`]. Returns whether a save happened.
    pub async fn maybe_save(&mut self) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }
        self.save().await
    }

    /// Save the pending payload now. Returns false if there is none.
    pub async fn save(&mut self) -> StorageResult<bool> {
        let Some(payload) = self.pending.borrow().payload.clone() else {
            return Ok(false);
        };
        let id = match &self.document_id {
            Some(id) => id.clone(),
            None => serde_json::from_str::<DocumentId>(&payload.serialized_document)
                .map_err(|e| StorageError::Serialization(e.to_string()))?
                .id,
        };

        self.storage.save(&id, &payload).await?;
        self.storage.save(LAST_DOCUMENT_KEY, &payload).await?;
        log::debug!("Auto-saved document {}", id);

        self.last_save = Some(Instant::now());
        self.pending.borrow_mut().dirty = false;
        Ok(true)
    }

    pub async fn load(&mut self, id: &str) -> StorageResult<PersistPayload> {
        let payload = self.storage.load(id).await?;
        self.document_id = Some(id.to_string());
        self.mark_clean();
        Ok(payload)
    }

    /// The most recently saved payload, if any.
    pub async fn load_last(&mut self) -> Option<PersistPayload> {
        match self.storage.load(LAST_DOCUMENT_KEY).await {
            Ok(payload) => {
                self.mark_clean();
                Some(payload)
            }
            Err(e) => {
                log::debug!("No last document: {}", e);
                None
            }
        }
    }

    fn mark_clean(&mut self) {
        self.pending.borrow_mut().dirty = false;
        self.last_save = Some(Instant::now());
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// Saved ids, without [`LAST_DOCUMENT_KEY`].
    pub async fn list_documents(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list().await?;
        ids.retain(|id| id != LAST_DOCUMENT_KEY);
        Ok(ids)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

impl<S: Storage> PersistenceHook for AutoSaveManager<S> {
    fn persist(&mut self, payload: &PersistPayload) {
        self.pending.borrow_mut().record(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::history::HistoryManager;
    use crate::storage::{MemoryStorage, block_on};
    use crate::viewport::Viewport;

    fn manager() -> AutoSaveManager<MemoryStorage> {
        AutoSaveManager::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_clean_manager_does_not_save() {
        let mut manager = manager();
        assert!(!manager.should_save());
        assert!(!block_on(manager.maybe_save()).unwrap());
        assert!(!block_on(manager.save()).unwrap());
    }

    #[test]
    fn test_hook_feeds_manager_from_history() {
        let mut manager = manager();
        let doc = Document::default();
        let mut history = HistoryManager::new();
        history.set_persistence_hook(manager.hook());
        history.initialize(&doc, &Viewport::default()).unwrap();
        assert!(manager.is_dirty());

        assert!(block_on(manager.maybe_save()).unwrap());
        assert!(!manager.is_dirty());
        let stored = block_on(manager.storage().load(&doc.id)).unwrap();
        assert_eq!(stored.serialized_document, doc.to_json().unwrap());
        assert!(block_on(manager.storage().exists(LAST_DOCUMENT_KEY)).unwrap());
        assert_eq!(block_on(manager.list_documents()).unwrap(), vec![doc.id.clone()]);
    }

    #[test]
    fn test_interval_debounces() {
        let mut manager = manager();
        let doc = Document::default();
        let payload = PersistPayload {
            serialized_document: doc.to_json().unwrap(),
            width: doc.workspace_width,
            height: doc.workspace_height,
        };
        manager.persist(&payload);
        assert!(block_on(manager.maybe_save()).unwrap());

        manager.persist(&payload);
        assert!(manager.is_dirty());
        assert!(!block_on(manager.maybe_save()).unwrap());

        manager.set_interval(Duration::ZERO);
        assert!(block_on(manager.maybe_save()).unwrap());
    }

    #[test]
    fn test_explicit_document_id_and_load_last() {
        let mut manager = manager();
        manager.set_document_id(Some("mine".to_string()));
        let payload = PersistPayload {
            serialized_document: "not a document".to_string(),
            width: 1.0,
            height: 2.0,
        };
        manager.persist(&payload);
        assert!(block_on(manager.save()).unwrap());
        assert!(block_on(manager.storage().exists("mine")).unwrap());
        assert_eq!(block_on(manager.load_last()), Some(payload));
    }

    #[test]
    fn test_unkeyed_garbage_is_serialization_error() {
        let mut manager = manager();
        manager.persist(&PersistPayload {
            serialized_document: "{".to_string(),
            width: 1.0,
            height: 1.0,
        });
        assert!(matches!(block_on(manager.save()), Err(StorageError::Serialization(_))));
    }
}
