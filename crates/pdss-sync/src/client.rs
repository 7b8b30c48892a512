//! The tracking side of the replication protocol.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::phase::ReplicaPhase;
use pdss_core::{Path, Value};
use pdss_net::{ReplicaId, SyncMessage, Transport};
use pdss_store::{Role, Store};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Feeds a tracking store from an authority over a transport.
///
/// Boot: request the full state with bounded retry, merge it, mark the
/// store ready. Thereafter: apply each incremental update through the
/// store's normal write path, so wrapping and binding notification are
/// identical for remote and local writes. Updates that race ahead of the
/// snapshot stall on the readiness gate; they are never dropped.
///
/// A tracking replica never broadcasts. Local writes are allowed and
/// create divergence from the authority with no reconciliation.
pub struct ClientReplicator {
    store: Arc<Store>,
    phase_rx: watch::Receiver<ReplicaPhase>,
    inbox_task: JoinHandle<()>,
    apply_task: JoinHandle<()>,
}

impl ClientReplicator {
    /// Attach a `Tracking` store to an authority.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport>(
        store: Arc<Store>,
        transport: Arc<T>,
        authority: ReplicaId,
        config: SyncConfig,
    ) -> Result<Self> {
        if store.role() != Role::Tracking {
            return Err(SyncError::WrongRole {
                expected: "Tracking",
            });
        }

        let (phase_tx, phase_rx) = watch::channel(ReplicaPhase::Initializing);
        let inbox = transport.subscribe();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let apply_task = tokio::spawn(apply_loop(store.clone(), update_rx));
        let inbox_task = tokio::spawn(inbox_loop(
            store.clone(),
            transport,
            authority,
            config,
            inbox,
            update_tx,
            phase_tx,
        ));

        Ok(Self {
            store,
            phase_rx,
            inbox_task,
            apply_task,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn phase(&self) -> ReplicaPhase {
        *self.phase_rx.borrow()
    }

    /// Resolve once the replica reaches `Live`; fail if the snapshot
    /// transfer is abandoned instead.
    pub async fn wait_live(&self) -> Result<()> {
        let mut rx = self.phase_rx.clone();
        loop {
            match *rx.borrow_and_update() {
                ReplicaPhase::Live => return Ok(()),
                ReplicaPhase::Uninitialized => return Err(SyncError::SnapshotFailed),
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(SyncError::SnapshotFailed);
            }
        }
    }
}

impl std::fmt::Debug for ClientReplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientReplicator")
            .field("phase", &*self.phase_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientReplicator {
    fn drop(&mut self) {
        self.inbox_task.abort();
        self.apply_task.abort();
    }
}

/// Applies incremental updates in arrival order, behind the readiness
/// gate: a delta delivered before the snapshot stalls here until the
/// snapshot has been merged.
async fn apply_loop(store: Arc<Store>, mut updates: mpsc::UnboundedReceiver<(Path, Value)>) {
    while let Some((path, value)) = updates.recv().await {
        store.ready().await;
        if let Err(err) = store.set_path(&path, value) {
            // Writing through an unreplicated branch is an integration
            // bug; surface it, do not mask it.
            error!(%err, path = %path, "failed to apply incremental update");
        }
    }
}

async fn inbox_loop<T: Transport>(
    store: Arc<Store>,
    transport: Arc<T>,
    authority: ReplicaId,
    config: SyncConfig,
    mut inbox: mpsc::Receiver<(ReplicaId, SyncMessage)>,
    updates: mpsc::UnboundedSender<(Path, Value)>,
    phase: watch::Sender<ReplicaPhase>,
) {
    // Boot: request the full state, buffering any deltas that race ahead
    // of the response.
    let mut attempts = 0u32;
    loop {
        if attempts >= config.snapshot_retries {
            warn!(attempts, "snapshot transfer abandoned");
            store.reset_ready();
            let _ = phase.send(ReplicaPhase::Uninitialized);
            return;
        }
        attempts += 1;

        if let Err(err) = transport.send(&authority, SyncMessage::StateRequest).await {
            warn!(%err, attempt = attempts, "snapshot request failed");
            continue;
        }

        match await_state(&mut inbox, &authority, &updates, config.snapshot_timeout()).await {
            StateOutcome::State(state) => match store.apply_snapshot(state) {
                Ok(()) => break,
                Err(err) => {
                    warn!(%err, "malformed snapshot; requesting a fresh one");
                    continue;
                }
            },
            StateOutcome::TimedOut => {
                debug!(attempt = attempts, "snapshot request timed out");
            }
            StateOutcome::Closed => {
                store.reset_ready();
                let _ = phase.send(ReplicaPhase::Uninitialized);
                return;
            }
        }
    }

    store.mark_ready();
    let _ = phase.send(ReplicaPhase::Ready);
    let _ = phase.send(ReplicaPhase::Live);
    info!("tracking replica live");

    // Live: forward deltas to the applier, in arrival order.
    while let Some((from, message)) = inbox.recv().await {
        if from != authority {
            continue;
        }
        match message {
            SyncMessage::Update { path, value } => {
                let _ = updates.send((path, value));
            }
            // A duplicate snapshot response changes nothing we rely on.
            SyncMessage::StateResponse { .. } => {}
            // Tracking replicas do not serve state.
            SyncMessage::StateRequest => {}
        }
    }

    // Transport gone: stale readiness must not keep serving waits.
    warn!("transport closed; replica back to uninitialized");
    store.reset_ready();
    let _ = phase.send(ReplicaPhase::Uninitialized);
}

enum StateOutcome {
    State(Value),
    TimedOut,
    Closed,
}

/// Wait for the snapshot response within one timeout window, forwarding
/// any incremental updates that arrive first.
async fn await_state(
    inbox: &mut mpsc::Receiver<(ReplicaId, SyncMessage)>,
    authority: &ReplicaId,
    updates: &mpsc::UnboundedSender<(Path, Value)>,
    window: std::time::Duration,
) -> StateOutcome {
    let deadline = Instant::now() + window;
    loop {
        match timeout_at(deadline, inbox.recv()).await {
            Err(_) => return StateOutcome::TimedOut,
            Ok(None) => return StateOutcome::Closed,
            Ok(Some((from, message))) => {
                if &from != authority {
                    continue;
                }
                match message {
                    SyncMessage::StateResponse { state } => return StateOutcome::State(state),
                    SyncMessage::Update { path, value } => {
                        let _ = updates.send((path, value));
                    }
                    SyncMessage::StateRequest => {}
                }
            }
        }
    }
}
