use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SetupError;

/// Identifies one reliable, ordered peer link. Both ends of a link see the
/// same id.
pub type ConnectionId = u64;

/// Something that happened on a transport, queued until the owner drains it.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened(ConnectionId),
    Message(ConnectionId, Bytes),
    Closed(ConnectionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote end is gone. A `Closed` event follows.
    ConnectionClosed(ConnectionId),
    UnknownConnection(ConnectionId),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionClosed(id) => write!(f, "connection {id} is closed"),
            Self::UnknownConnection(id) => write!(f, "unknown connection {id}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Peer-to-peer message transport the session layer is written against.
///
/// Inbound traffic never calls back into the owner; it is queued and handed
/// out by [`Transport::try_next_event`] so the simulation can drain it at the
/// start of a tick.
pub trait Transport: Send {
    /// Queue `data` for delivery. Fire-and-forget: a dead link surfaces as a
    /// `Closed` event, the error here is only for logging.
    fn send(&self, conn: ConnectionId, data: Bytes) -> Result<(), TransportError>;

    /// Tear down a link. Both ends observe `Closed`.
    fn close(&mut self, conn: ConnectionId);

    /// Next queued event, without waiting.
    fn try_next_event(&mut self) -> Option<TransportEvent>;
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

enum Wire {
    Open {
        conn: ConnectionId,
        reply_to: mpsc::UnboundedSender<Wire>,
    },
    Data {
        conn: ConnectionId,
        data: Bytes,
    },
    Close {
        conn: ConnectionId,
    },
}

/// In-process signaling: peers register under a string id and connect to each
/// other by that id. Cheap to clone; all clones share one registry.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Wire>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer_id` and return its transport.
    pub fn listen(&self, peer_id: impl Into<String>) -> Result<MemoryTransport, SetupError> {
        let peer_id = peer_id.into();
        if peer_id.is_empty() {
            return Err(SetupError::Signaling("peer id must not be empty".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
            if peers.get(&peer_id).is_some_and(|existing| !existing.is_closed()) {
                return Err(SetupError::PeerIdTaken(peer_id));
            }
            peers.insert(peer_id.clone(), tx.clone());
        }
        tracing::debug!(peer_id = %peer_id, "Peer registered");
        Ok(MemoryTransport {
            peer_id,
            network: self.clone(),
            inbox_tx: tx,
            inbox: rx,
            links: HashMap::new(),
            pending: VecDeque::new(),
        })
    }

    /// Open a link from `local` to the peer registered as `remote_id`. Both
    /// sides get an `Opened` event.
    pub fn connect(
        &self,
        local: &mut MemoryTransport,
        remote_id: &str,
    ) -> Result<ConnectionId, SetupError> {
        let remote = {
            let peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
            peers
                .get(remote_id)
                .filter(|tx| !tx.is_closed())
                .cloned()
                .ok_or_else(|| SetupError::PeerNotFound(remote_id.to_string()))?
        };
        let conn = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        remote
            .send(Wire::Open {
                conn,
                reply_to: local.inbox_tx.clone(),
            })
            .map_err(|_| SetupError::PeerNotFound(remote_id.to_string()))?;
        local.links.insert(conn, remote);
        local.pending.push_back(TransportEvent::Opened(conn));
        tracing::debug!(from = %local.peer_id, to = remote_id, conn, "Link opened");
        Ok(conn)
    }

    fn unregister(&self, peer_id: &str, inbox: &mpsc::UnboundedSender<Wire>) {
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        if peers.get(peer_id).is_some_and(|tx| tx.same_channel(inbox)) {
            peers.remove(peer_id);
        }
    }
}

/// One peer's end of a [`MemoryNetwork`]. Dropping it closes every link.
pub struct MemoryTransport {
    peer_id: String,
    network: MemoryNetwork,
    inbox_tx: mpsc::UnboundedSender<Wire>,
    inbox: mpsc::UnboundedReceiver<Wire>,
    links: HashMap<ConnectionId, mpsc::UnboundedSender<Wire>>,
    pending: VecDeque<TransportEvent>,
}

impl MemoryTransport {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn connection_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.links.contains_key(&conn)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, conn: ConnectionId, data: Bytes) -> Result<(), TransportError> {
        let link = self
            .links
            .get(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        link.send(Wire::Data { conn, data })
            .map_err(|_| TransportError::ConnectionClosed(conn))
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(link) = self.links.remove(&conn) {
            let _ = link.send(Wire::Close { conn });
            self.pending.push_back(TransportEvent::Closed(conn));
        }
    }

    fn try_next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        while let Ok(wire) = self.inbox.try_recv() {
            match wire {
                Wire::Open { conn, reply_to } => {
                    self.links.insert(conn, reply_to);
                    return Some(TransportEvent::Opened(conn));
                },
                Wire::Data { conn, data } => {
                    // Traffic that raced a local close is dropped.
                    if self.links.contains_key(&conn) {
                        return Some(TransportEvent::Message(conn, data));
                    }
                },
                Wire::Close { conn } => {
                    if self.links.remove(&conn).is_some() {
                        return Some(TransportEvent::Closed(conn));
                    }
                },
            }
        }
        None
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        for (conn, link) in self.links.drain() {
            let _ = link.send(Wire::Close { conn });
        }
        self.network.unregister(&self.peer_id, &self.inbox_tx);
    }
}
