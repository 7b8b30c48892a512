//! Transport trait and the in-memory implementation.

use crate::error::NetError;
use crate::message::{ReplicaId, SyncMessage};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Queue depth for each endpoint's inbox.
const INBOX_CAPACITY: usize = 100;

/// Connection state of a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerState {
    Disconnected,
    Connected,
}

/// Information about a linked peer.
#[derive(Clone, Debug)]
pub struct Peer {
    pub id: ReplicaId,
    pub state: PeerState,
}

/// Ordered, reliable message delivery between replicas.
///
/// Implementations must deliver broadcasts and sends in order per sender;
/// the replication layer adds no sequence numbers and performs no
/// resequencing of its own.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver `message` to every linked peer.
    async fn broadcast(&self, message: SyncMessage) -> Result<(), NetError>;

    /// Deliver `message` to one peer. Carries the snapshot
    /// request/response pair.
    async fn send(&self, peer: &ReplicaId, message: SyncMessage) -> Result<(), NetError>;

    /// All currently linked peers.
    async fn connected_peers(&self) -> Vec<Peer>;

    /// Take this endpoint's inbox. Inbound messages arrive tagged with the
    /// sender's id. May be called once per transport.
    fn subscribe(&self) -> mpsc::Receiver<(ReplicaId, SyncMessage)>;
}

/// Shared handle to an endpoint's not-yet-taken inbox.
type SharedInbox = Arc<RwLock<Option<mpsc::Receiver<(ReplicaId, SyncMessage)>>>>;
/// Per-peer senders into the peers' inboxes.
type Links = Arc<RwLock<HashMap<ReplicaId, mpsc::Sender<(ReplicaId, SyncMessage)>>>>;

/// In-memory transport for tests and same-process topologies.
///
/// Endpoints are linked pairwise; each link is an mpsc channel into the
/// peer's inbox, so delivery is ordered per sender.
pub struct MemoryTransport {
    local_id: ReplicaId,
    peers: Arc<RwLock<HashMap<ReplicaId, Peer>>>,
    inbox_tx: mpsc::Sender<(ReplicaId, SyncMessage)>,
    inbox_rx: SharedInbox,
    links: Links,
}

impl MemoryTransport {
    pub fn new(local_id: ReplicaId) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        Self {
            local_id,
            peers: Arc::new(RwLock::new(HashMap::new())),
            inbox_tx: tx,
            inbox_rx: Arc::new(RwLock::new(Some(rx))),
            links: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn local_id(&self) -> &ReplicaId {
        &self.local_id
    }

    /// Link two endpoints in both directions.
    pub fn link_with(&self, other: &MemoryTransport) {
        self.peers.write().insert(
            other.local_id.clone(),
            Peer {
                id: other.local_id.clone(),
                state: PeerState::Connected,
            },
        );
        self.links
            .write()
            .insert(other.local_id.clone(), other.inbox_tx.clone());

        other.peers.write().insert(
            self.local_id.clone(),
            Peer {
                id: self.local_id.clone(),
                state: PeerState::Connected,
            },
        );
        other
            .links
            .write()
            .insert(self.local_id.clone(), self.inbox_tx.clone());
    }

    /// Drop the link to `peer` in this direction.
    pub fn unlink(&self, peer: &ReplicaId) {
        self.peers.write().remove(peer);
        self.links.write().remove(peer);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn broadcast(&self, message: SyncMessage) -> Result<(), NetError> {
        let senders: Vec<_> = {
            let links = self.links.read();
            links.values().cloned().collect()
        };

        debug!(from = %self.local_id, peers = senders.len(), "broadcast");
        for tx in senders {
            let _ = tx.send((self.local_id.clone(), message.clone())).await;
        }
        Ok(())
    }

    async fn send(&self, peer: &ReplicaId, message: SyncMessage) -> Result<(), NetError> {
        let tx = {
            let links = self.links.read();
            links.get(peer).cloned()
        };

        match tx {
            Some(tx) => tx
                .send((self.local_id.clone(), message))
                .await
                .map_err(|e| NetError::SendFailed(e.to_string())),
            None => Err(NetError::PeerNotFound(peer.to_string())),
        }
    }

    async fn connected_peers(&self) -> Vec<Peer> {
        self.peers.read().values().cloned().collect()
    }

    fn subscribe(&self) -> mpsc::Receiver<(ReplicaId, SyncMessage)> {
        self.inbox_rx
            .write()
            .take()
            .expect("subscribe can only be called once")
    }
}

/// Build a hub-and-spoke network: one hub endpoint linked to `spokes`
/// spoke endpoints, which are not linked to each other. The hub is the
/// natural seat of an authority replica.
pub fn star_network(spokes: usize) -> (MemoryTransport, Vec<MemoryTransport>) {
    let hub = MemoryTransport::new(ReplicaId::generate());
    let spokes: Vec<_> = (0..spokes)
        .map(|_| {
            let spoke = MemoryTransport::new(ReplicaId::generate());
            hub.link_with(&spoke);
            spoke
        })
        .collect();
    (hub, spokes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_is_bidirectional() {
        let a = MemoryTransport::new(ReplicaId::new("a"));
        let b = MemoryTransport::new(ReplicaId::new("b"));
        a.link_with(&b);

        assert_eq!(a.connected_peers().await.len(), 1);
        assert_eq!(b.connected_peers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_link() {
        let (hub, spokes) = star_network(3);

        hub.broadcast(SyncMessage::StateRequest).await.unwrap();

        for spoke in &spokes {
            let mut inbox = spoke.subscribe();
            let (from, msg) = inbox.recv().await.unwrap();
            assert_eq!(&from, hub.local_id());
            assert_eq!(msg, SyncMessage::StateRequest);
        }
    }

    #[tokio::test]
    async fn test_send_targets_one_peer() {
        let (hub, spokes) = star_network(2);

        hub.send(spokes[0].local_id(), SyncMessage::StateRequest)
            .await
            .unwrap();

        let mut first = spokes[0].subscribe();
        assert!(first.recv().await.is_some());

        let mut second = spokes[1].subscribe();
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails() {
        let a = MemoryTransport::new(ReplicaId::new("a"));
        let err = a
            .send(&ReplicaId::new("ghost"), SyncMessage::StateRequest)
            .await
            .unwrap_err();
        assert_eq!(err, NetError::PeerNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_delivery_preserves_sender_order() {
        let a = MemoryTransport::new(ReplicaId::new("a"));
        let b = MemoryTransport::new(ReplicaId::new("b"));
        a.link_with(&b);

        for i in 0..10 {
            a.send(
                b.local_id(),
                SyncMessage::Update {
                    path: pdss_core::Path::parse("seq"),
                    value: pdss_core::Value::Int(i),
                },
            )
            .await
            .unwrap();
        }

        let mut inbox = b.subscribe();
        for i in 0..10 {
            match inbox.recv().await.unwrap().1 {
                SyncMessage::Update { value, .. } => assert_eq!(value.as_int(), Some(i)),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }
}
