use std::collections::HashMap;

use async_trait::async_trait;
use smol::lock::Mutex;

use super::Store;
use crate::error::Result;

/// A storage backend that does nothing; `get` always returns absent.
/// Used by the `hash` CLI when mapping persistence is undesired
/// (spec.md §4.3, §9).
#[derive(Default)]
pub struct NullStore;

#[async_trait]
impl Store for NullStore {
    async fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// A process-local, in-memory key-value store. No eviction, not shared
/// between processes (spec.md §4.3).
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.lock().await.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.lock().await.remove(key);
        Ok(())
    }
}
