//! In-memory storage backend.

use crate::{CredentialStore, StoreResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory credential store.
///
/// Nothing survives the process; use it in tests and in embedders that have
/// no platform secure storage to wire up yet.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().unwrap();
        Ok(data.remove(key).is_some())
    }

    fn delete_all(&self) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        data.clear();
        Ok(())
    }
}
