// The gossip engine. A single dispatcher consumes every peer event in arrival
// order, so handlers never race each other; only the object store and the peer
// table are shared with connection threads.

use crate::config::ProtocolParams;
use crate::core::{validate_object, ObjectId, ObjectKind, ObjectOutcome};
use crate::error::{NodeError, Result};
use crate::network::connection::PeerEvent;
use crate::network::message::DecodeError;
use crate::network::{Direction, Message, Transport};
use crate::storage::{KeyValueStore, MemoryPool, ObjectStore, PeerBook};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub struct Node {
    params: ProtocolParams,
    store: ObjectStore,
    peer_book: PeerBook,
    mempool: MemoryPool,
    transport: Transport,
    rebroadcast_to_sender: bool,
}

impl Node {
    pub fn new(params: ProtocolParams, kv: Arc<dyn KeyValueStore>, transport: Transport) -> Node {
        Node {
            params,
            store: ObjectStore::new(Arc::clone(&kv)),
            peer_book: PeerBook::new(kv),
            mempool: MemoryPool::new(),
            transport,
            rebroadcast_to_sender: true,
        }
    }

    pub fn with_rebroadcast_to_sender(mut self, enabled: bool) -> Node {
        self.rebroadcast_to_sender = enabled;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    /// Dial every known peer, seeding the book from `seeds` on first start
    pub fn bootstrap(&self, seeds: &[String]) -> Result<()> {
        for address in self.peer_book.seed_if_empty(seeds)? {
            self.connect_to(&address);
        }
        Ok(())
    }

    /// Dispatch events until every sender is gone
    pub fn run(&self, events: Receiver<PeerEvent>) {
        for event in events.iter() {
            if let Err(e) = self.handle_event(event) {
                error!("Failed to handle peer event: {e}");
            }
        }
        info!("Event channel closed, node stopping");
    }

    pub fn handle_event(&self, event: PeerEvent) -> Result<()> {
        match event {
            PeerEvent::Connected { addr, session, .. } => {
                if !self.is_current(&addr, session)? {
                    debug!("Ignoring replaced session {session} of {addr}");
                    return Ok(());
                }
                self.send_hello(&addr)
            }
            PeerEvent::Frame {
                addr,
                session,
                bytes,
            } => {
                if !self.is_current(&addr, session)? {
                    debug!("Dropping frame from departed session {session} of {addr}");
                    return Ok(());
                }
                self.handle_frame(&addr, &bytes)
            }
            PeerEvent::Disconnected { addr, session } => {
                self.transport.table().remove_session(&addr, session)?;
                Ok(())
            }
        }
    }

    fn is_current(&self, addr: &str, session: u64) -> Result<bool> {
        Ok(self.transport.table().session(addr)? == Some(session))
    }

    fn send_hello(&self, addr: &str) -> Result<()> {
        let state = match self.transport.table().handshake(addr)? {
            Some(state) => state,
            None => return Ok(()),
        };
        if state.hello_sent {
            return Ok(());
        }
        let hello = Message::Hello {
            version: self.params.version.clone(),
            agent: self.params.agent.clone(),
        };
        self.transport.send(addr, &hello)?;
        self.transport
            .table()
            .update_handshake(addr, |h| h.hello_sent = true)?;
        Ok(())
    }

    fn handle_frame(&self, addr: &str, bytes: &[u8]) -> Result<()> {
        let state = match self.transport.table().handshake(addr)? {
            Some(state) => state,
            None => {
                debug!("Dropping frame from departed peer {addr}");
                return Ok(());
            }
        };

        let decoded = Message::decode(bytes);
        if !state.hello_recv {
            return match decoded {
                Err(DecodeError::Json(reason)) => {
                    warn!("Dropping unparseable frame from {addr}: {reason}");
                    Ok(())
                }
                Ok(Message::Hello { version, agent }) => self.handle_hello(addr, &version, &agent),
                Ok(other) => {
                    warn!(
                        "Peer {addr} sent {} before hello, disconnecting",
                        other.type_name()
                    );
                    self.transport.disconnect(addr).map(|_| ())
                }
                Err(e) => {
                    warn!("Peer {addr} sent an invalid first message ({e}), disconnecting");
                    self.transport.disconnect(addr).map(|_| ())
                }
            };
        }

        match decoded {
            Ok(message) => self.dispatch(addr, message),
            Err(DecodeError::Json(reason)) => {
                warn!("Dropping unparseable frame from {addr}: {reason}");
                Ok(())
            }
            Err(e) => {
                warn!("Rejecting message from {addr}: {e}");
                self.reply(addr, &Message::error(e.to_string()))
            }
        }
    }

    fn handle_hello(&self, addr: &str, version: &str, agent: &str) -> Result<()> {
        if !self.params.version_pattern.matches(version) {
            warn!(
                "Peer {addr} speaks version {version}, expected {}; disconnecting",
                self.params.version_pattern
            );
            self.transport.disconnect(addr)?;
            return Ok(());
        }
        info!("Received hello from {addr} (version {version}, agent {agent:?})");
        self.transport
            .table()
            .update_handshake(addr, |h| h.hello_recv = true)?;
        self.send_hello(addr)?;

        let established = self
            .transport
            .table()
            .handshake(addr)?
            .is_some_and(|h| h.is_established());
        if established {
            self.on_established(addr)?;
        }
        Ok(())
    }

    fn on_established(&self, addr: &str) -> Result<()> {
        info!("Handshake with {addr} complete");
        if self.transport.table().direction(addr)? == Some(Direction::Outbound)
            && self.peer_book.record(addr)?
        {
            info!("Added {addr} to the peer book");
        }

        let priming = [
            Message::GetPeers,
            Message::GetObject {
                objectid: self.params.genesis_id.clone(),
            },
            Message::GetMempool,
            Message::GetChainTip,
        ];
        for message in priming.iter() {
            self.transport.send(addr, message)?;
        }
        Ok(())
    }

    fn dispatch(&self, addr: &str, message: Message) -> Result<()> {
        debug!("Received {} from {addr}", message.type_name());
        match message {
            Message::Hello { .. } => {
                debug!("Ignoring repeated hello from {addr}");
                Ok(())
            }
            Message::GetPeers => {
                let peers = self.known_peers()?;
                self.reply(addr, &Message::Peers { peers })
            }
            Message::Peers { peers } => {
                self.handle_peers(&peers)?;
                Ok(())
            }
            Message::GetObject { objectid } => match self.store.get(&objectid)? {
                Some(object) => self.reply(addr, &Message::Object { object }),
                None => {
                    debug!("Object {objectid} requested by {addr} is unknown");
                    Ok(())
                }
            },
            Message::IHaveObject { objectid } => self.request_missing(addr, &[objectid]),
            Message::Object { object } => self.handle_object(addr, object),
            Message::GetMempool => {
                let txids = self.mempool.get_all();
                self.reply(addr, &Message::Mempool { txids })
            }
            Message::Mempool { txids } => self.request_missing(addr, &txids),
            Message::GetChainTip => {
                if self.store.contains(&self.params.genesis_id)? {
                    let blockid = self.params.genesis_id.clone();
                    self.reply(addr, &Message::ChainTip { blockid })
                } else {
                    debug!("No chain tip to report to {addr}");
                    Ok(())
                }
            }
            Message::ChainTip { blockid } => self.request_missing(addr, &[blockid]),
            Message::Error { error } => {
                warn!("Peer {addr} reported an error: {error}");
                Ok(())
            }
        }
    }

    /// Book entries plus every established session, deduplicated and sorted
    fn known_peers(&self) -> Result<Vec<String>> {
        let mut peers: BTreeSet<String> = self.peer_book.addresses()?.into_iter().collect();
        peers.extend(self.transport.table().established_addresses()?);
        Ok(peers.into_iter().collect())
    }

    fn handle_peers(&self, peers: &[String]) -> Result<usize> {
        let mut dialed = 0;
        for address in peers {
            if self.transport.table().is_full()? {
                debug!("Peer limit reached, ignoring remaining advertised peers");
                break;
            }
            if self.connect_to(address) {
                dialed += 1;
            }
        }
        Ok(dialed)
    }

    fn connect_to(&self, address: &str) -> bool {
        match self.transport.connect(address) {
            Ok(_) => true,
            Err(NodeError::DuplicatePeer(addr)) => {
                debug!("Already connected to {addr}");
                false
            }
            Err(e @ NodeError::PeerLimit { .. }) => {
                debug!("Not dialing {address}: {e}");
                false
            }
            Err(e) => {
                warn!("Skipping peer {address}: {e}");
                false
            }
        }
    }

    fn request_missing(&self, addr: &str, ids: &[ObjectId]) -> Result<()> {
        for id in ids {
            if !self.store.contains(id)? {
                self.reply(addr, &Message::GetObject { objectid: id.clone() })?;
            }
        }
        Ok(())
    }

    fn handle_object(&self, addr: &str, object: Value) -> Result<()> {
        let id = ObjectId::of(&object)?;
        if self.store.contains(&id)? {
            debug!("Already have object {id}");
            return Ok(());
        }

        match validate_object(&object, &self.store, &self.params)? {
            ObjectOutcome::Accept { id, kind } => {
                if !self.store.put(&id, &object)? {
                    return Ok(());
                }
                info!("Stored {kind:?} {id} from {addr}");
                if kind == ObjectKind::Transaction {
                    self.mempool.add(id.clone());
                }
                let except = if self.rebroadcast_to_sender {
                    None
                } else {
                    Some(addr)
                };
                self.transport
                    .broadcast(&Message::IHaveObject { objectid: id }, except)?;
                Ok(())
            }
            ObjectOutcome::Defer { id, missing } => {
                info!("Deferring object {id} from {addr}: waiting for {missing}");
                Ok(())
            }
            ObjectOutcome::Reject { id, reason } => {
                warn!("Rejected object {id} from {addr}: {reason}");
                self.reply(addr, &Message::error(format!("Invalid object {id}: {reason}")))
            }
        }
    }

    /// Send to one peer; a peer that vanished mid-handler is not an error
    fn reply(&self, addr: &str, message: &Message) -> Result<()> {
        match self.transport.send(addr, message) {
            Ok(()) => Ok(()),
            Err(NodeError::FrameTooLarge { size, max }) => {
                error!("Not sending {} to {addr}: {size} bytes exceeds {max}", message.type_name());
                Ok(())
            }
            Err(e) => {
                debug!("Could not reach {addr}: {e}");
                Ok(())
            }
        }
    }
}
