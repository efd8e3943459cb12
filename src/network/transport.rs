use crate::error::{NodeError, Result};
use crate::network::connection::{run_session, Dialer, PeerEvent};
use crate::network::{Direction, Message, PeerTable};
use log::{debug, error, info, warn};
use std::net::{Shutdown, SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

/// Owns the peer table and every socket behind it
pub struct Transport {
    table: Arc<PeerTable>,
    events: Sender<PeerEvent>,
    dialer: Arc<dyn Dialer>,
    local_addr: Option<SocketAddr>,
    resolving: Arc<AtomicUsize>,
}

impl Transport {
    pub fn new(table: Arc<PeerTable>, events: Sender<PeerEvent>, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            table,
            events,
            dialer,
            local_addr: None,
            resolving: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never dial `addr`; it is this node's own listener
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn table(&self) -> &Arc<PeerTable> {
        &self.table
    }

    /// Accept inbound sessions on a background thread
    pub fn listen(&self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| NodeError::Network(format!("Failed to read listen address: {e}")))?;
        info!("Server listening on {local}");

        let table = Arc::clone(&self.table);
        let events = self.events.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                        continue;
                    }
                };
                let peer_addr = match stream.peer_addr() {
                    Ok(addr) => addr.to_string(),
                    Err(e) => {
                        error!("Failed to get peer address: {e}");
                        continue;
                    }
                };
                let session = match table.reserve(&peer_addr, Direction::Inbound) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!("Rejecting connection from {peer_addr}: {e}");
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }
                };
                let table = Arc::clone(&table);
                let events = events.clone();
                thread::spawn(move || {
                    run_session(stream, peer_addr, session, Direction::Inbound, table, events)
                });
            }
        });
        Ok(())
    }

    /// Start dialing `address` in the background.
    ///
    /// A literal `ip:port` is checked for duplicates and the peer cap right
    /// here. A host name is resolved on the dial thread and checked there;
    /// either way the check happens before any socket is opened.
    pub fn connect(&self, address: &str) -> Result<()> {
        let dial = self.dial_context();
        if let Ok(resolved) = address.parse::<SocketAddr>() {
            let session = dial.reserve(address, resolved)?;
            thread::spawn(move || dial.dial(resolved, session));
            return Ok(());
        }

        // Lookups in flight count against the cap
        if self.table.len()? + self.resolving.load(Ordering::SeqCst) >= self.table.max_peers() {
            return Err(NodeError::PeerLimit {
                max: self.table.max_peers(),
            });
        }
        self.resolving.fetch_add(1, Ordering::SeqCst);
        let resolving = Arc::clone(&self.resolving);
        let address = address.to_string();
        thread::spawn(move || {
            let reserved = resolve(&address).and_then(|resolved| {
                dial.reserve(&address, resolved)
                    .map(|session| (resolved, session))
            });
            resolving.fetch_sub(1, Ordering::SeqCst);
            match reserved {
                Ok((resolved, session)) => dial.dial(resolved, session),
                Err(NodeError::DuplicatePeer(addr)) => debug!("Already connected to {addr}"),
                Err(e) => warn!("Not dialing {address}: {e}"),
            }
        });
        Ok(())
    }

    fn dial_context(&self) -> DialContext {
        DialContext {
            table: Arc::clone(&self.table),
            events: self.events.clone(),
            dialer: Arc::clone(&self.dialer),
            local_addr: self.local_addr,
        }
    }

    /// Queue `message` for one peer
    pub fn send(&self, addr: &str, message: &Message) -> Result<()> {
        let frame = message.encode()?;
        let link = self
            .table
            .link(addr)?
            .ok_or_else(|| NodeError::Network(format!("Peer {addr} is not connected")))?;
        debug!("Sending {} to {addr}", message.type_name());
        link.send_frame(frame)
    }

    /// Queue `message` for every established peer except `except`
    pub fn broadcast(&self, message: &Message, except: Option<&str>) -> Result<usize> {
        let frame = message.encode()?;
        let mut delivered = 0;
        for (addr, link) in self.table.established()? {
            if except == Some(addr.as_str()) {
                continue;
            }
            match link.send_frame(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipping {addr} in broadcast: {e}"),
            }
        }
        info!("Broadcast {} to {delivered} peers", message.type_name());
        Ok(delivered)
    }

    pub fn disconnect(&self, addr: &str) -> Result<bool> {
        self.table.remove(addr)
    }

    pub fn shutdown(&self) {
        match self.table.close_all() {
            Ok(count) => info!("Closed {count} peer connections"),
            Err(e) => error!("Failed to close peer connections: {e}"),
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything a dial thread needs, detached from the dispatcher
struct DialContext {
    table: Arc<PeerTable>,
    events: Sender<PeerEvent>,
    dialer: Arc<dyn Dialer>,
    local_addr: Option<SocketAddr>,
}

impl DialContext {
    fn reserve(&self, address: &str, resolved: SocketAddr) -> Result<u64> {
        if self.is_own_address(&resolved) {
            return Err(NodeError::InvalidAddress(format!(
                "{address} is this node's own listen address"
            )));
        }
        let session = self
            .table
            .reserve(&resolved.to_string(), Direction::Outbound)?;
        info!("Connecting to peer {resolved}");
        Ok(session)
    }

    fn is_own_address(&self, candidate: &SocketAddr) -> bool {
        match self.local_addr {
            Some(local) if local == *candidate => true,
            Some(local) if local.ip().is_unspecified() => {
                local.port() == candidate.port() && candidate.ip().is_loopback()
            }
            _ => false,
        }
    }

    /// Blocks until the session ends or the dial fails
    fn dial(self, resolved: SocketAddr, session: u64) {
        let peer_addr = resolved.to_string();
        match self.dialer.dial(resolved) {
            Ok(stream) => run_session(
                stream,
                peer_addr,
                session,
                Direction::Outbound,
                self.table,
                self.events,
            ),
            Err(e) => {
                warn!("{e}");
                if let Err(e) = self.table.remove_session(&peer_addr, session) {
                    error!("Failed to release {peer_addr}: {e}");
                }
            }
        }
    }
}

/// Resolve `host:port` to one socket address, preferring IPv4
pub fn resolve(address: &str) -> Result<SocketAddr> {
    let candidates: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|e| NodeError::InvalidAddress(format!("{address}: {e}")))?
        .collect();
    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| NodeError::InvalidAddress(format!("{address} did not resolve")))
}
