//! Distributed cache store backend, memcached-style (spec.md §4.3).
//!
//! A fixed pool of independently-connected `memcache::Client`s is kept;
//! each operation reserves one for its duration and returns it
//! afterward, bounding concurrency to the pool size (spec.md §5). Keys
//! are UTF-8, values are base64-encoded before being handed to the
//! cluster, matching the wire format the original Python relay used
//! (`jidstorage.MemcacheStorage._pack_val`).

use log::warn;
use smol::channel::{Receiver, Sender};

use super::Store;
use crate::error::Result;
use crate::settings::MemcacheSettings;
use async_trait::async_trait;

/// Default pool size when the configuration doesn't specify one.
const DEFAULT_POOL_SIZE: usize = 4;

pub struct DistributedStore {
    free: Sender<memcache::Client>,
    taken: Receiver<memcache::Client>,
}

impl DistributedStore {
    pub fn connect(settings: &MemcacheSettings) -> Result<Self> {
        Self::connect_with_pool_size(settings, DEFAULT_POOL_SIZE)
    }

    pub fn connect_with_pool_size(settings: &MemcacheSettings, pool_size: usize) -> Result<Self> {
        let urls = settings.connection_urls();
        let pool_size = pool_size.max(1);

        let (free, taken) = smol::channel::bounded(pool_size);
        for _ in 0..pool_size {
            let client = memcache::Client::connect(urls.clone())
                .map_err(|e| crate::error::Error::Connection(format!("memcache: {e}")))?;
            free.try_send(client).expect("pool channel has room for every slot");
        }

        Ok(Self { free, taken })
    }

    async fn reserve(&self) -> memcache::Client {
        self.taken.recv().await.expect("pool sender is never dropped while self is alive")
    }

    fn release(&self, client: memcache::Client) {
        // The channel is sized exactly to the pool, so this never blocks.
        let _ = self.free.try_send(client);
    }

    fn pack_key(key: &[u8]) -> String {
        String::from_utf8_lossy(key).into_owned()
    }

    fn pack_val(value: &[u8]) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, value)
    }

    fn unpack_val(value: &str) -> Option<Vec<u8>> {
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, value).ok()
    }
}

#[async_trait]
impl Store for DistributedStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let client = self.reserve().await;
        let packed_key = Self::pack_key(key);
        let result = smol::unblock(move || client.get::<String>(&packed_key).map(|v| (v, client)))
            .await;

        match result {
            Ok((value, client)) => {
                self.release(client);
                Ok(value.as_deref().and_then(Self::unpack_val))
            }
            Err(e) => {
                warn!("memcache get failed, treating as absent: {e}");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let client = self.reserve().await;
        let packed_key = Self::pack_key(key);
        let packed_val = Self::pack_val(value);
        let result =
            smol::unblock(move || client.set(&packed_key, packed_val.as_str(), 0).map(|_| client))
                .await;

        match result {
            Ok(client) => {
                self.release(client);
                Ok(())
            }
            Err(e) => {
                warn!("memcache set failed: {e}");
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let client = self.reserve().await;
        let packed_key = Self::pack_key(key);
        let result = smol::unblock(move || client.delete(&packed_key).map(|_| client)).await;

        match result {
            Ok(client) => {
                self.release(client);
                Ok(())
            }
            Err(e) => {
                warn!("memcache delete failed: {e}");
                Ok(())
            }
        }
    }
}
