use crate::error::{NodeError, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The remote side dialed us
    Inbound,
    /// We dialed the remote side
    Outbound,
}

/// Handshake progress of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Handshake {
    pub hello_sent: bool,
    pub hello_recv: bool,
}

impl Handshake {
    pub fn is_established(&self) -> bool {
        self.hello_sent && self.hello_recv
    }
}

/// Instructions for a connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// Handle for queueing frames to one peer; frames go out in enqueue order
#[derive(Debug, Clone)]
pub struct PeerLink {
    outbox: Sender<Outbound>,
}

impl PeerLink {
    pub fn new(outbox: Sender<Outbound>) -> PeerLink {
        PeerLink { outbox }
    }

    pub fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        self.outbox
            .send(Outbound::Frame(frame))
            .map_err(|_| NodeError::Network("Connection writer has stopped".to_string()))
    }

    pub fn close(&self) {
        // A stopped writer has already closed the socket
        let _ = self.outbox.send(Outbound::Close);
    }
}

struct PeerEntry {
    session: u64,
    direction: Direction,
    link: Option<PeerLink>,
    handshake: Handshake,
}

/// Every live or connecting session, keyed by resolved `ip:port`.
///
/// Each reservation gets a fresh session number, so events from a closed
/// session can never act on a later session with the same address.
pub struct PeerTable {
    peers: Mutex<HashMap<String, PeerEntry>>,
    next_session: AtomicU64,
    max_peers: usize,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> PeerTable {
        PeerTable {
            peers: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            max_peers,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, PeerEntry>>> {
        self.peers
            .lock()
            .map_err(|e| NodeError::Network(format!("Failed to acquire peer lock: {e}")))
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Claim a slot for `address` before any socket work happens; returns the session number
    pub fn reserve(&self, address: &str, direction: Direction) -> Result<u64> {
        let mut peers = self.lock()?;
        if peers.contains_key(address) {
            return Err(NodeError::DuplicatePeer(address.to_string()));
        }
        if peers.len() >= self.max_peers {
            return Err(NodeError::PeerLimit {
                max: self.max_peers,
            });
        }
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        peers.insert(
            address.to_string(),
            PeerEntry {
                session,
                direction,
                link: None,
                handshake: Handshake::default(),
            },
        );
        Ok(session)
    }

    /// Attach the writer of a reserved session
    pub fn attach(&self, address: &str, link: PeerLink) -> Result<()> {
        let mut peers = self.lock()?;
        let entry = peers.get_mut(address).ok_or_else(|| {
            NodeError::Network(format!("Peer {address} was removed before it connected"))
        })?;
        entry.link = Some(link);
        Ok(())
    }

    /// Drop whatever session holds `address` and close its socket; removing twice is a no-op
    pub fn remove(&self, address: &str) -> Result<bool> {
        let removed = self.lock()?.remove(address);
        Ok(Self::close_removed(address, removed))
    }

    /// Like [`PeerTable::remove`], but only if `address` still belongs to `session`
    pub fn remove_session(&self, address: &str, session: u64) -> Result<bool> {
        let removed = {
            let mut peers = self.lock()?;
            match peers.get(address) {
                Some(entry) if entry.session == session => peers.remove(address),
                Some(_) => {
                    debug!("Session {session} of {address} already replaced");
                    None
                }
                None => None,
            }
        };
        Ok(Self::close_removed(address, removed))
    }

    fn close_removed(address: &str, removed: Option<PeerEntry>) -> bool {
        match removed {
            Some(entry) => {
                if let Some(link) = entry.link {
                    link.close();
                }
                info!("Disconnected from peer: {address}");
                true
            }
            None => {
                debug!("Peer {address} already removed");
                false
            }
        }
    }

    /// Session number currently holding `address`
    pub fn session(&self, address: &str) -> Result<Option<u64>> {
        Ok(self.lock()?.get(address).map(|entry| entry.session))
    }

    pub fn contains(&self, address: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(address))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_full(&self) -> Result<bool> {
        Ok(self.len()? >= self.max_peers)
    }

    pub fn direction(&self, address: &str) -> Result<Option<Direction>> {
        Ok(self.lock()?.get(address).map(|entry| entry.direction))
    }

    pub fn handshake(&self, address: &str) -> Result<Option<Handshake>> {
        Ok(self.lock()?.get(address).map(|entry| entry.handshake))
    }

    /// Apply `update` to the session's handshake and return the new state
    pub fn update_handshake<F>(&self, address: &str, update: F) -> Result<Option<Handshake>>
    where
        F: FnOnce(&mut Handshake),
    {
        let mut peers = self.lock()?;
        Ok(peers.get_mut(address).map(|entry| {
            update(&mut entry.handshake);
            entry.handshake
        }))
    }

    pub fn link(&self, address: &str) -> Result<Option<PeerLink>> {
        Ok(self
            .lock()?
            .get(address)
            .and_then(|entry| entry.link.clone()))
    }

    /// Snapshot of every session that completed the handshake
    pub fn established(&self) -> Result<Vec<(String, PeerLink)>> {
        let peers = self.lock()?;
        let mut snapshot: Vec<(String, PeerLink)> = peers
            .iter()
            .filter(|(_, entry)| entry.handshake.is_established())
            .filter_map(|(addr, entry)| entry.link.clone().map(|link| (addr.clone(), link)))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(snapshot)
    }

    pub fn established_addresses(&self) -> Result<Vec<String>> {
        Ok(self
            .established()?
            .into_iter()
            .map(|(addr, _)| addr)
            .collect())
    }

    /// Close every session; used on shutdown
    pub fn close_all(&self) -> Result<usize> {
        let drained: Vec<(String, PeerEntry)> = self.lock()?.drain().collect();
        for (_, entry) in drained.iter() {
            if let Some(link) = &entry.link {
                link.close();
            }
        }
        Ok(drained.len())
    }
}
