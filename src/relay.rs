//! Relay engine (C6). See spec.md §4.6.
//!
//! Composition over inheritance (spec.md §9 Design Notes): the engine
//! owns a reference to whatever implements [`Transport`] rather than
//! subclassing an XMPP component base class. `Transport::recv`/`send`
//! stand in for "subscribe_message(handler)" and "send(stanza)"; `run`
//! below is the event loop that would otherwise live on a component
//! base class.
//!
//! Rewriting is immutable-with-builder (spec.md §9 Design Notes):
//! [`Stanza::rewritten`] returns a new stanza with `to`/`from` replaced
//! rather than mutating the inbound one in place.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};

use crate::address::Address;
use crate::alias::ALIAS_RESOURCE;
use crate::alias::AliasService;
use crate::error::{Error, Result};
use crate::storage::Store;

/// The subset of stanza types the relay acts on; everything else is
/// dropped silently (spec.md §4.6 step 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StanzaType {
    Normal,
    Chat,
    /// No `type` attribute at all.
    Empty,
    Error,
    GroupChat,
    Other(String),
}

impl StanzaType {
    fn is_relayable(&self) -> bool {
        matches!(self, StanzaType::Normal | StanzaType::Chat | StanzaType::Empty)
    }
}

/// A message stanza. `extra` carries whatever child elements/ids/thread
/// the real wire format has — the relay never inspects it, only `body`
/// for the bot-command sub-protocol.
#[derive(Clone, Debug)]
pub struct Stanza {
    pub stanza_type: StanzaType,
    pub to: Address,
    pub from: Address,
    pub body: String,
    pub extra: Vec<u8>,
}

impl Stanza {
    pub fn new(stanza_type: StanzaType, to: Address, from: Address, body: impl Into<String>) -> Self {
        Self { stanza_type, to, from, body: body.into(), extra: Vec::new() }
    }

    /// Build the outbound copy of this stanza with `to`/`from`
    /// rewritten; body and other children carry over unchanged.
    fn rewritten(&self, to: Address, from: Address) -> Stanza {
        Stanza { stanza_type: self.stanza_type.clone(), to, from, body: self.body.clone(), extra: self.extra.clone() }
    }
}

/// The seam between the relay and the XMPP wire stack (out of scope —
/// spec.md §1). A real implementation owns the component connection,
/// TLS, and stanza (de)serialization; this trait is all the relay
/// engine needs from it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attach to the XMPP server as a component.
    async fn connect(&self) -> Result<()>;

    /// Enqueue a stanza for the wire. The wire is a single ordered
    /// channel, so implementations must serialize concurrent sends
    /// (spec.md §5).
    async fn send(&self, stanza: Stanza) -> Result<()>;

    /// Receive the next inbound message stanza, or `None` once the
    /// connection has closed.
    async fn recv(&self) -> Result<Option<Stanza>>;
}

pub struct RelayEngine<S: Store> {
    /// The component's own address.
    bot_jid: Address,
    /// The distinguished reply address: same bare, resource "a".
    bot_jid_a: Address,
    alias_service: AliasService<S>,
    /// Bound on storage and send latency (spec.md §5); on timeout the
    /// stanza is dropped.
    op_timeout: Duration,
}

impl<S: Store> RelayEngine<S> {
    pub fn new(bot_jid: Address, alias_service: AliasService<S>, op_timeout: Duration) -> Self {
        let bot_jid_a = bot_jid.with_resource(ALIAS_RESOURCE);
        Self { bot_jid, bot_jid_a, alias_service, op_timeout }
    }

    /// Drive the transport: connect, then handle inbound stanzas one
    /// at a time until the connection closes.
    pub async fn run(&self, transport: &(dyn Transport)) -> Result<()> {
        transport.connect().await?;
        while let Some(stanza) = transport.recv().await? {
            self.handle(transport, stanza).await;
        }
        Ok(())
    }

    /// Handle one inbound stanza (spec.md §4.6 "Classification").
    pub async fn handle(&self, transport: &(dyn Transport), stanza: Stanza) {
        if !stanza.stanza_type.is_relayable() {
            debug!("dropping stanza of type {:?}", stanza.stanza_type);
            return;
        }

        let outcome = if stanza.to.bare_eq(&self.bot_jid) {
            self.bot_command(&stanza).await
        } else {
            self.relay(&stanza).await
        };

        match outcome {
            Ok(Some(reply)) => {
                if let Err(e) = self.with_timeout(transport.send(reply)).await {
                    warn!("send failed, dropping: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("failed to handle stanza: {e}"),
        }
    }

    /// Race `fut` against `op_timeout`.
    async fn with_timeout<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        let timeout = async {
            smol::Timer::after(self.op_timeout).await;
            Err(Error::Timeout)
        };
        smol::future::or(fut, timeout).await
    }

    /// spec.md §4.6 "Relay handler".
    async fn relay(&self, stanza: &Stanza) -> Result<Option<Stanza>> {
        let dst_real = match self.with_timeout(self.alias_service.real_of(&stanza.to)).await {
            Ok(Some(addr)) => addr,
            Ok(None) => {
                warn!("couldn't find a prior jid for {}", stanza.to);
                return Ok(None);
            }
            Err(Error::CorruptEntry(msg)) => {
                error!("corrupt store entry for {}: {msg}", stanza.to);
                return Ok(None);
            }
            Err(e) => {
                // Storage read failure/timeout is treated as absence (spec.md §7).
                warn!("lookup failed for {}, treating as absent: {e}", stanza.to);
                return Ok(None);
            }
        };

        // `alias_of` itself already logs and proceeds on a `set` failure
        // (spec.md §4.6, §7); an `Err` here only means the op timed out.
        let src_alias = match self.with_timeout(self.alias_service.alias_of(&stanza.from)).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!("failed to derive alias for {}, dropping: {e}", stanza.from);
                return Ok(None);
            }
        };

        Ok(Some(stanza.rewritten(dst_real, src_alias)))
    }

    /// spec.md §4.6 "Bot-command handler".
    async fn bot_command(&self, stanza: &Stanza) -> Result<Option<Stanza>> {
        let mut words = stanza.body.split(' ');
        match words.next() {
            Some("/whoami") => {
                let alias = self.with_timeout(self.alias_service.alias_of(&stanza.from)).await?;
                let reply = Stanza::new(
                    stanza.stanza_type.clone(),
                    stanza.from.clone(),
                    self.bot_jid_a.clone(),
                    alias.bare(),
                );
                Ok(Some(reply))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use async_trait::async_trait;
    use smol::lock::Mutex;

    /// A transport that replays a fixed queue of inbound stanzas and
    /// records every outbound one, for driving end-to-end scenarios.
    struct MockTransport {
        inbound: Mutex<Vec<Stanza>>,
        outbound: Mutex<Vec<Stanza>>,
    }

    impl MockTransport {
        fn new(inbound: Vec<Stanza>) -> Self {
            Self { inbound: Mutex::new(inbound), outbound: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
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
        let alias_service = AliasService::new(b"0".repeat(32), "axr.local", MemoryStore::new());
        RelayEngine::new(Address::parse("axr.local-bot@axr.local"), alias_service, Duration::from_secs(5))
    }

    #[test]
    fn unknown_destination_is_dropped() {
        smol::block_on(async {
            let engine = engine();
            let transport = MockTransport::new(vec![]);
            let stanza =
                Stanza::new(StanzaType::Chat, Address::parse("bob@ex.com"), Address::parse("alice@ex.com/phone"), "hi");
            engine.handle(&transport, stanza).await;
            assert!(transport.outbound.lock().await.is_empty());
        });
    }

    #[test]
    fn whoami_replies_with_alias_bare() {
        smol::block_on(async {
            let engine = engine();
            let transport = MockTransport::new(vec![]);
            let stanza = Stanza::new(
                StanzaType::Chat,
                Address::parse("axr.local-bot@axr.local"),
                Address::parse("alice@ex.com/phone"),
                "/whoami",
            );
            engine.handle(&transport, stanza).await;

            let outbound = transport.outbound.lock().await;
            assert_eq!(outbound.len(), 1);
            let reply = &outbound[0];
            assert_eq!(reply.to, Address::parse("alice@ex.com/phone"));
            assert_eq!(reply.from.full(), "axr.local-bot@axr.local/a");

            let expected_alias = engine.alias_service.alias_of(&Address::parse("alice@ex.com/phone")).await.unwrap();
            assert_eq!(reply.body, expected_alias.bare());
        });
    }

    #[test]
    fn full_conversation_threads_through_relay() {
        smol::block_on(async {
            let engine = engine();
            let transport = MockTransport::new(vec![]);

            // 1. alice asks /whoami, learns her alias's bare form.
            let whoami = Stanza::new(
                StanzaType::Chat,
                Address::parse("axr.local-bot@axr.local"),
                Address::parse("alice@ex.com/phone"),
                "/whoami",
            );
            engine.handle(&transport, whoami).await;
            let alice_alias_bare = transport.outbound.lock().await.remove(0).body;

            // 2. bob messages that alias; relay forwards to alice, from bob's alias.
            let to_alice = Stanza::new(
                StanzaType::Chat,
                Address::parse(&alice_alias_bare),
                Address::parse("bob@ex.com/laptop"),
                "hi",
            );
            engine.handle(&transport, to_alice).await;
            let forwarded_to_alice = transport.outbound.lock().await.remove(0);
            assert_eq!(forwarded_to_alice.to, Address::parse("alice@ex.com/phone"));
            let bob_alias = forwarded_to_alice.from.clone();
            assert_eq!(bob_alias.resource, "a");

            // 3. alice replies to bob's alias; relay forwards to bob, from
            //    the same alias alice had in step 1.
            let reply = Stanza::new(
                StanzaType::Chat,
                Address::parse(&bob_alias.bare()),
                Address::parse("alice@ex.com/phone"),
                "hello back",
            );
            engine.handle(&transport, reply).await;
            let forwarded_to_bob = transport.outbound.lock().await.remove(0);
            assert_eq!(forwarded_to_bob.to, Address::parse("bob@ex.com/laptop"));
            assert_eq!(forwarded_to_bob.from.bare(), alice_alias_bare);
        });
    }

    #[test]
    fn groupchat_and_error_types_are_dropped() {
        smol::block_on(async {
            let engine = engine();
            let transport = MockTransport::new(vec![]);

            for stanza_type in [StanzaType::GroupChat, StanzaType::Error] {
                let stanza = Stanza::new(
                    stanza_type,
                    Address::parse("bob@ex.com"),
                    Address::parse("alice@ex.com/phone"),
                    "hi",
                );
                engine.handle(&transport, stanza).await;
            }
            assert!(transport.outbound.lock().await.is_empty());
        });
    }

    #[test]
    fn unknown_bot_command_is_ignored() {
        smol::block_on(async {
            let engine = engine();
            let transport = MockTransport::new(vec![]);
            let stanza = Stanza::new(
                StanzaType::Chat,
                Address::parse("axr.local-bot@axr.local"),
                Address::parse("alice@ex.com/phone"),
                "/unknown-command",
            );
            engine.handle(&transport, stanza).await;
            assert!(transport.outbound.lock().await.is_empty());
        });
    }
}
