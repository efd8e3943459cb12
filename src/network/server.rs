use crate::config::Settings;
use crate::error::{NodeError, Result};
use crate::network::connection::{PeerEvent, TcpDialer};
use crate::network::{Node, PeerTable, Transport};
use crate::storage::{KeyValueStore, SledStore};
use log::info;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

/// A bound listener plus the node that will serve it
pub struct Server {
    listener: TcpListener,
    node: Node,
    events: Receiver<PeerEvent>,
    seed_peers: Vec<String>,
}

impl Server {
    /// Bind the listening socket; failing to bind is fatal to startup
    pub fn bind(settings: &Settings, kv: Arc<dyn KeyValueStore>) -> Result<Server> {
        let params = settings.protocol()?;
        let listener = TcpListener::bind(&settings.listen_address).map_err(|e| {
            NodeError::Network(format!(
                "Failed to bind to {}: {e}",
                settings.listen_address
            ))
        })?;
        let local_addr = local_addr_of(&listener)?;

        let (events_tx, events) = mpsc::channel();
        let table = Arc::new(PeerTable::new(settings.max_peers));
        let dialer = Arc::new(TcpDialer::new(settings.connect_timeout()));
        let transport = Transport::new(table, events_tx, dialer).with_local_addr(local_addr);
        let node = Node::new(params, kv, transport)
            .with_rebroadcast_to_sender(settings.rebroadcast_to_sender);

        Ok(Server {
            listener,
            node,
            events,
            seed_peers: settings.seed_peers.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        local_addr_of(&self.listener)
    }

    /// Serve until the process exits
    pub fn run(self) -> Result<()> {
        let Server {
            listener,
            node,
            events,
            seed_peers,
        } = self;
        node.transport().listen(listener)?;
        node.bootstrap(&seed_peers)?;
        info!("Node is running");
        node.run(events);
        Ok(())
    }
}

fn local_addr_of(listener: &TcpListener) -> Result<SocketAddr> {
    listener
        .local_addr()
        .map_err(|e| NodeError::Network(format!("Failed to read listen address: {e}")))
}

/// Open the sled database configured for this node
pub fn open_store(settings: &Settings) -> Result<Arc<SledStore>> {
    let store = SledStore::open(&settings.db_path)?;
    info!("Opened object database at {}", store.get_db_path().display());
    Ok(Arc::new(store))
}
