//! End-to-end scenarios against the public API only (no `#[cfg(test)]`
//! internals), following the teacher workspace's `tests/harness.rs`
//! convention for contract-level integration tests.

use std::time::Duration;

use async_trait::async_trait;
use smol::lock::Mutex;

use axrelay::address::Address;
use axrelay::alias::AliasService;
use axrelay::error::Result;
use axrelay::relay::{RelayEngine, Stanza, StanzaType, Transport};
use axrelay::storage::memory::MemoryStore;

struct ScriptedTransport {
    inbound: Mutex<Vec<Stanza>>,
    outbound: Mutex<Vec<Stanza>>,
}

impl ScriptedTransport {
    fn new(mut inbound: Vec<Stanza>) -> Self {
        inbound.reverse();
        Self { inbound: Mutex::new(inbound), outbound: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, stanza: Stanza) -> Result<()> {
        self.outbound.lock().await.push(stanza);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Stanza>> {
        Ok(self.inbound.lock().await.pop())
    }
}

fn engine() -> RelayEngine<MemoryStore> {
    let alias_service = AliasService::new(b"integration-test-secret".to_vec(), "axr.local", MemoryStore::new());
    RelayEngine::new(Address::parse("axr.local-bot@axr.local"), alias_service, Duration::from_secs(5))
}

#[test]
fn run_drains_inbound_queue_and_stops_on_close() {
    smol::block_on(async {
        let engine = engine();
        let stanzas = vec![
            Stanza::new(
                StanzaType::Chat,
                Address::parse("axr.local-bot@axr.local"),
                Address::parse("alice@ex.com/phone"),
                "/whoami",
            ),
            Stanza::new(StanzaType::GroupChat, Address::parse("room@conf.ex.com"), Address::parse("bob@ex.com"), "hi"),
        ];
        let transport = ScriptedTransport::new(stanzas);

        engine.run(&transport).await.unwrap();

        let outbound = transport.outbound.lock().await;
        assert_eq!(outbound.len(), 1, "only the /whoami reply should have been sent");
    });
}

#[test]
fn two_strangers_exchange_messages_only_through_aliases() {
    smol::block_on(async {
        let engine = engine();

        // alice learns her alias.
        let learn = ScriptedTransport::new(vec![Stanza::new(
            StanzaType::Chat,
            Address::parse("axr.local-bot@axr.local"),
            Address::parse("alice@ex.com/phone"),
            "/whoami",
        )]);
        engine.run(&learn).await.unwrap();
        let alice_alias = learn.outbound.lock().await.remove(0).body;
        assert!(Address::parse(&alice_alias).is_alias("axr.local"));

        // bob messages that alias without ever learning alice's real address.
        let introduce = ScriptedTransport::new(vec![Stanza::new(
            StanzaType::Chat,
            Address::parse(&alice_alias),
            Address::parse("bob@ex.com/desk"),
            "hello",
        )]);
        engine.run(&introduce).await.unwrap();
        let delivered = introduce.outbound.lock().await.remove(0);
        assert_eq!(delivered.to, Address::parse("alice@ex.com/phone"));
        assert_ne!(delivered.from.full(), "bob@ex.com/desk");
        assert!(delivered.from.is_alias("axr.local"));
    });
}

#[test]
fn message_to_unknown_alias_produces_no_reply() {
    smol::block_on(async {
        let engine = engine();
        let transport = ScriptedTransport::new(vec![Stanza::new(
            StanzaType::Chat,
            Address::parse("nobodyhasheardofthis@axr.local/a"),
            Address::parse("mallory@ex.com"),
            "hi?",
        )]);
        engine.run(&transport).await.unwrap();
        assert!(transport.outbound.lock().await.is_empty());
    });
}
