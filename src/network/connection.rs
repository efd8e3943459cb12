// One thread per connection reads and frames inbound bytes; a companion writer
// thread drains the peer's outbox. Both end when the socket is shut down.

use crate::error::{NodeError, Result};
use crate::network::framing::{Frame, FrameBuffer, MAX_FRAME_LEN};
use crate::network::{Direction, Outbound, PeerLink, PeerTable};
use log::{debug, error, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;

/// Everything the dispatcher hears about peers, tagged with the session it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Connected {
        addr: String,
        session: u64,
        direction: Direction,
    },
    Frame {
        addr: String,
        session: u64,
        bytes: Vec<u8>,
    },
    Disconnected {
        addr: String,
        session: u64,
    },
}

/// Opens outbound sockets
pub trait Dialer: Send + Sync {
    fn dial(&self, addr: SocketAddr) -> Result<TcpStream>;
}

pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(timeout: Duration) -> TcpDialer {
        TcpDialer { timeout }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, addr: SocketAddr) -> Result<TcpStream> {
        TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| NodeError::Network(format!("Failed to connect to {addr}: {e}")))
    }
}

/// Drive a freshly opened socket whose address is reserved in `table` as `session`.
///
/// Blocks the calling thread in the read loop until the session ends.
pub fn run_session(
    stream: TcpStream,
    addr: String,
    session: u64,
    direction: Direction,
    table: Arc<PeerTable>,
    events: Sender<PeerEvent>,
) {
    if let Err(e) = start_session(stream, &addr, session, direction, &table, &events) {
        error!("Session with {addr} failed to start: {e}");
        if let Err(e) = table.remove_session(&addr, session) {
            warn!("Failed to release {addr}: {e}");
        }
    }
}

fn start_session(
    stream: TcpStream,
    addr: &str,
    session: u64,
    direction: Direction,
    table: &PeerTable,
    events: &Sender<PeerEvent>,
) -> Result<()> {
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| NodeError::Network(format!("Failed to set write timeout: {e}")))?;
    let writer_stream = stream
        .try_clone()
        .map_err(|e| NodeError::Network(format!("Failed to clone stream: {e}")))?;

    let (outbox, queue) = mpsc::channel();
    let writer_addr = addr.to_string();
    thread::spawn(move || write_loop(writer_stream, queue, writer_addr));

    if let Err(e) = table.attach(addr, PeerLink::new(outbox)) {
        let _ = stream.shutdown(Shutdown::Both);
        return Err(e);
    }
    info!("Connected to peer: {addr} ({direction:?})");

    events
        .send(PeerEvent::Connected {
            addr: addr.to_string(),
            session,
            direction,
        })
        .map_err(|_| NodeError::Network("Dispatcher has stopped".to_string()))?;

    read_loop(stream, addr, session, events);
    let _ = events.send(PeerEvent::Disconnected {
        addr: addr.to_string(),
        session,
    });
    Ok(())
}

fn read_loop(mut stream: TcpStream, addr: &str, session: u64, events: &Sender<PeerEvent>) {
    let mut frames = FrameBuffer::new();
    let mut buf = [0u8; MAX_FRAME_LEN];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                debug!("Peer {addr} closed the connection");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Read from {addr} failed: {e}");
                break;
            }
        };
        for frame in frames.push(&buf[..n]) {
            match frame {
                Frame::Line(bytes) => {
                    let event = PeerEvent::Frame {
                        addr: addr.to_string(),
                        session,
                        bytes,
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
                Frame::Oversized { len } => {
                    warn!("Dropped {len}-byte frame from {addr}: exceeds {MAX_FRAME_LEN} bytes");
                }
            }
        }
    }
    if frames.pending_len() > 0 {
        debug!(
            "Discarding {} bytes of unterminated frame from {addr}",
            frames.pending_len()
        );
    }
    let _ = stream.shutdown(Shutdown::Both);
}

fn write_loop(mut stream: TcpStream, queue: Receiver<Outbound>, addr: String) {
    for outbound in queue.iter() {
        match outbound {
            Outbound::Frame(bytes) => {
                if let Err(e) = stream.write_all(&bytes).and_then(|_| stream.flush()) {
                    warn!("Write to {addr} failed: {e}");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    // Unblocks the reader as well
    let _ = stream.shutdown(Shutdown::Both);
}
