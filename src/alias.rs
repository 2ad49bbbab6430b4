//! Alias service (C5). See spec.md §4.5.

use crate::address::Address;
use crate::crypto::secret_hash;
use crate::error::Result;
use crate::storage::Store;

/// The fixed resource aliases reply from, so that recipients have a
/// stable resource to reply to (spec.md §4.5).
pub const ALIAS_RESOURCE: &str = "a";

pub struct AliasService<S: Store> {
    hash_secret: Vec<u8>,
    alias_domain: String,
    store: S,
}

impl<S: Store> AliasService<S> {
    pub fn new(hash_secret: Vec<u8>, alias_domain: impl Into<String>, store: S) -> Self {
        Self { hash_secret, alias_domain: alias_domain.into(), store }
    }

    /// Derive the alias for `addr`, recording the reverse mapping. An
    /// address already in the alias domain is returned unchanged
    /// (alias-of-alias is the address itself).
    pub async fn alias_of(&self, addr: &Address) -> Result<Address> {
        if addr.is_alias(&self.alias_domain) {
            return Ok(addr.clone());
        }

        let name = secret_hash(addr.full().as_bytes(), &self.hash_secret);
        let alias = Address::new(name, self.alias_domain.clone(), ALIAS_RESOURCE);
        if let Err(e) = self.store.set(alias.bare().as_bytes(), addr.full().as_bytes()).await {
            log::warn!("failed to record alias mapping for {addr}, forwarding anyway: {e}");
        }
        Ok(alias)
    }

    /// Reverse-lookup the real address behind `alias`, ignoring its
    /// resource. Returns `None` if no mapping is known.
    pub async fn real_of(&self, alias: &Address) -> Result<Option<Address>> {
        match self.store.get(alias.bare().as_bytes()).await? {
            Some(full) => Ok(Some(Address::parse(&String::from_utf8_lossy(&full)))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn service() -> AliasService<MemoryStore> {
        AliasService::new(b"hash-secret".to_vec(), "axr.local", MemoryStore::new())
    }

    #[test]
    fn alias_is_deterministic() {
        smol::block_on(async {
            let svc = service();
            let addr = Address::parse("alice@ex.com/phone");
            let a1 = svc.alias_of(&addr).await.unwrap();
            let a2 = svc.alias_of(&addr).await.unwrap();
            assert_eq!(a1, a2);
            assert_eq!(a1.resource, "a");
        });
    }

    #[test]
    fn alias_of_alias_is_identity() {
        smol::block_on(async {
            let svc = service();
            let already = Address::parse("name@axr.local/a");
            let result = svc.alias_of(&already).await.unwrap();
            assert_eq!(result, already);
        });
    }

    #[test]
    fn round_trip() {
        smol::block_on(async {
            let svc = service();
            let real = Address::parse("alice@ex.com/phone");
            let alias = svc.alias_of(&real).await.unwrap();
            let looked_up = svc.real_of(&alias).await.unwrap().unwrap();
            assert_eq!(looked_up.full(), real.full());
        });
    }

    #[test]
    fn unknown_alias_is_absent() {
        smol::block_on(async {
            let svc = service();
            let unknown = Address::parse("neverseen@axr.local/a");
            assert!(svc.real_of(&unknown).await.unwrap().is_none());
        });
    }

    #[test]
    fn different_resources_yield_different_aliases_but_same_bare_lookup() {
        smol::block_on(async {
            let svc = service();
            let phone = Address::parse("alice@ex.com/phone");
            let laptop = Address::parse("alice@ex.com/laptop");
            let alias_phone = svc.alias_of(&phone).await.unwrap();
            let alias_laptop = svc.alias_of(&laptop).await.unwrap();
            assert_ne!(alias_phone, alias_laptop);

            // reverse lookup only cares about the bare alias
            let looked_up = svc.real_of(&alias_phone.with_resource("ignored")).await.unwrap().unwrap();
            assert_eq!(looked_up.full(), phone.full());
        });
    }
}
