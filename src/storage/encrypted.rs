//! Non-enumerable store wrapper (C4). See spec.md §4.4.

use async_trait::async_trait;

use super::Store;
use crate::cipher;
use crate::crypto::secret_hash;
use crate::error::Result;

/// Wraps any [`Store`] so that neither its keys nor its values reveal
/// anything about the logical data without also knowing `secret` — and,
/// for the keys, a plausible logical key to test against (spec.md
/// §4.4's poisoning defense).
pub struct NonEnumerableStore<S: Store> {
    inner: S,
    secret: Vec<u8>,
}

impl<S: Store> NonEnumerableStore<S> {
    pub fn new(inner: S, secret: Vec<u8>) -> Self {
        Self { inner, secret }
    }

    fn hash_key(&self, key: &[u8]) -> Vec<u8> {
        secret_hash(key, &self.secret).into_bytes()
    }
}

#[async_trait]
impl<S: Store> Store for NonEnumerableStore<S> {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let physical_key = self.hash_key(key);
        match self.inner.get(&physical_key).await? {
            None => Ok(None),
            Some(physical_value) => {
                let plaintext = cipher::decrypt(&self.secret, key, &physical_value)?;
                Ok(Some(plaintext))
            }
        }
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let physical_key = self.hash_key(key);
        let physical_value = cipher::encrypt(&self.secret, key, value);
        self.inner.set(&physical_key, &physical_value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let physical_key = self.hash_key(key);
        self.inner.delete(&physical_key).await
    }
}
