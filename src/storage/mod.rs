//! Storage backend (C3). See spec.md §4.3.
//!
//! Keys and values are opaque byte strings; the capability set is
//! `{get, set, delete}`. Backends surface failures per spec.md §7: a
//! read failure looks like absence, a write/delete failure is logged
//! and otherwise ignored by the backend itself (the caller decides
//! whether that's fatal).

pub mod encrypted;
pub mod memcache;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    async fn delete(&self, key: &[u8]) -> Result<()>;
}

pub use encrypted::NonEnumerableStore;
pub use memcache::DistributedStore;
pub use memory::{MemoryStore, NullStore};

/// Lets a boxed trait object stand in for `S: Store`, so the bootstrap
/// code can pick a backend at runtime from configuration (spec.md §6)
/// without `RelayEngine`/`AliasService` needing to know about that choice.
#[async_trait]
impl Store for Box<dyn Store> {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key).await
    }
}
