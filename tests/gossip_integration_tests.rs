//! Gossip integration tests
//!
//! Runs real nodes on loopback sockets and talks to them the way a remote
//! peer would: newline-delimited JSON over TCP.

use penguin_node::core::Transaction;
use penguin_node::storage::{KeyValueStore, MemoryStore, ObjectStore, PeerBook};
use penguin_node::{Object, ObjectId, Server, Settings, Wallet, COINBASE_VALUE};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn start_node(seed_peers: Vec<String>) -> (SocketAddr, Arc<MemoryStore>) {
    let settings = Settings {
        listen_address: "127.0.0.1:0".to_string(),
        seed_peers,
        ..Settings::default()
    };
    let kv = Arc::new(MemoryStore::new());
    let server = Server::bind(&settings, kv.clone()).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    (addr, kv)
}

struct TestPeer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestPeer {
    fn connect(addr: SocketAddr) -> TestPeer {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(WAIT)).unwrap();
        TestPeer {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send(&mut self, message: Value) {
        let mut bytes = serde_json::to_vec(&message).unwrap();
        bytes.push(b'\n');
        self.writer.write_all(&bytes).unwrap();
    }

    /// Next message, or `None` once the node has closed the connection
    fn recv(&mut self) -> Option<Value> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(serde_json::from_str(line.trim_end()).unwrap()),
        }
    }

    fn handshake(&mut self) -> Vec<Value> {
        let hello = self.recv().unwrap();
        assert_eq!(hello["type"], "hello");
        self.send(json!({"type": "hello", "version": "0.2.3", "agent": "test-peer"}));
        (0..4).map(|_| self.recv().unwrap()).collect()
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_first_message_must_be_hello() {
    let (addr, _kv) = start_node(vec![]);
    let mut peer = TestPeer::connect(addr);

    assert_eq!(peer.recv().unwrap()["type"], "hello");
    peer.send(json!({"type": "getpeers"}));

    // The node hangs up without replying
    assert_eq!(peer.recv(), None);
}

#[test]
fn test_handshake_primes_sync_and_answers_getpeers() {
    let (addr, _kv) = start_node(vec![]);
    let mut peer = TestPeer::connect(addr);

    let priming = peer.handshake();
    let types: Vec<&str> = priming.iter().map(|m| m["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["getpeers", "getobject", "getmempool", "getchaintip"]);

    peer.send(json!({"type": "getpeers"}));
    let reply = peer.recv().unwrap();
    assert_eq!(reply["type"], "peers");
    assert!(reply["peers"].is_array());

    peer.send(json!({"type": "teleport"}));
    assert_eq!(
        peer.recv().unwrap(),
        json!({"type": "error", "error": "Unknown message type: teleport"})
    );
}

#[test]
fn test_garbage_frames_do_not_end_session() {
    let (addr, _kv) = start_node(vec![]);
    let mut peer = TestPeer::connect(addr);
    peer.handshake();

    peer.writer.write_all(b"this is not json\n").unwrap();
    peer.send(json!({"type": "getmempool"}));
    assert_eq!(peer.recv().unwrap(), json!({"type": "mempool", "txids": []}));
}

#[test]
fn test_object_floods_between_nodes() {
    let (addr_a, kv_a) = start_node(vec![]);
    let (addr_b, kv_b) = start_node(vec![addr_a.to_string()]);

    // B only records A once their handshake is complete
    let book_b = PeerBook::new(kv_b.clone());
    assert!(wait_until(|| !book_b.addresses().unwrap().is_empty()));
    assert_eq!(book_b.addresses().unwrap(), vec![addr_a.to_string()]);

    let wallet = Wallet::new().unwrap();
    let tx = Transaction::new_coinbase(0, &wallet.public_key_hex(), COINBASE_VALUE);
    let object = serde_json::to_value(Object::Transaction(tx)).unwrap();
    let id = ObjectId::of(&object).unwrap();

    let mut peer = TestPeer::connect(addr_b);
    peer.handshake();
    peer.send(json!({"type": "object", "object": object}));
    assert_eq!(
        peer.recv().unwrap(),
        json!({"type": "ihaveobject", "objectid": id.as_str()})
    );

    let store_a = ObjectStore::new(kv_a.clone());
    assert!(wait_until(|| store_a.contains(&id).unwrap()));
    assert_eq!(store_a.get(&id).unwrap(), Some(object));
    assert!(kv_b.get(&format!("object:{id}")).unwrap().is_some());
}
