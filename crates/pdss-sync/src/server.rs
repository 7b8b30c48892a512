//! The authority side of the replication protocol.

use crate::error::{Result, SyncError};
use crate::phase::ReplicaPhase;
use pdss_net::{ReplicaId, SyncMessage, Transport};
use pdss_store::{Change, Role, Store};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Serves the authoritative store over a transport.
///
/// Every `StateRequest` is answered with the entire current stripped tree
/// — never a replay of historical deltas — and every store write is
/// forwarded as exactly one incremental broadcast, independent of
/// snapshot traffic.
pub struct ServerReplicator {
    store: Arc<Store>,
    phase_rx: watch::Receiver<ReplicaPhase>,
    _phase_tx: watch::Sender<ReplicaPhase>,
    task: JoinHandle<()>,
}

impl ServerReplicator {
    /// Take over an `Authority` store: mark it ready and start serving.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport>(store: Arc<Store>, transport: Arc<T>) -> Result<Self> {
        if store.role() != Role::Authority {
            return Err(SyncError::WrongRole {
                expected: "Authority",
            });
        }

        let (phase_tx, phase_rx) = watch::channel(ReplicaPhase::Initializing);
        let changes = store.changes();
        let inbox = transport.subscribe();

        // The root is wrapped at construction; the authority is ready as
        // soon as it starts serving.
        store.mark_ready();
        let _ = phase_tx.send(ReplicaPhase::Ready);
        let _ = phase_tx.send(ReplicaPhase::Live);
        info!("authority replica live");

        let task = tokio::spawn(serve(store.clone(), transport, changes, inbox));
        Ok(Self {
            store,
            phase_rx,
            _phase_tx: phase_tx,
            task,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn phase(&self) -> ReplicaPhase {
        *self.phase_rx.borrow()
    }
}

impl std::fmt::Debug for ServerReplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerReplicator")
            .field("phase", &*self.phase_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl Drop for ServerReplicator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<T: Transport>(
    store: Arc<Store>,
    transport: Arc<T>,
    mut changes: broadcast::Receiver<Change>,
    mut inbox: mpsc::Receiver<(ReplicaId, SyncMessage)>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(Change { path, value }) => {
                    debug!(path = %path, "broadcasting delta");
                    if let Err(err) = transport.broadcast(SyncMessage::Update { path, value }).await {
                        warn!(%err, "delta broadcast failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change stream lagged; peers may be stale");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            request = inbox.recv() => match request {
                Some((from, SyncMessage::StateRequest)) => {
                    debug!(peer = %from, "serving full state");
                    let state = store.snapshot();
                    if let Err(err) = transport.send(&from, SyncMessage::StateResponse { state }).await {
                        warn!(%err, peer = %from, "snapshot send failed");
                    }
                }
                // The authority is the sole writer; nothing else inbound
                // is meaningful.
                Some(_) => {}
                None => break,
            },
        }
    }
}
