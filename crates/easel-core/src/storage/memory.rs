//! In-memory storage.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::history::PersistPayload;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    payloads: RwLock<HashMap<String, PersistPayload>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, payload: &PersistPayload) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let payload = payload.clone();
        Box::pin(async move {
            self.payloads.write().map_err(lock_error)?.insert(id, payload);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<PersistPayload>> {
        let id = id.to_string();
        Box::pin(async move {
            let payloads = self.payloads.read().map_err(lock_error)?;
            payloads.get(&id).cloned().ok_or(StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            self.payloads.write().map_err(lock_error)?.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let payloads = self.payloads.read().map_err(lock_error)?;
            let mut ids: Vec<String> = payloads.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.payloads.read().map_err(lock_error)?.contains_key(&id)) })
    }
}
