//! Replica state stores with explicit write interception.

use crate::bindings::{dispatch, BindingTree};
use crate::error::{Result, StoreError};
use crate::node::{Node, Slot};
use parking_lot::RwLock;
use pdss_core::{Key, Path, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Capacity of the change stream before slow subscribers start lagging.
const CHANGE_BUFFER: usize = 100;

/// Which side of the replication protocol a store sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The authoritative replica. Its changes are forwarded to peers.
    Authority,
    /// A dependent replica fed by an authority. Local writes are allowed
    /// but never forwarded; divergence is accepted, not reconciled.
    Tracking,
    /// Same-process shared state, never replicated. Live at construction.
    Local,
}

/// One `(path, value)` change produced by a write.
///
/// The value is the plain payload: a bare scalar for scalar writes, a
/// stripped mirror for nested writes.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub path: Path,
    pub value: Value,
}

struct StoreInner {
    root: Node,
    bindings: BindingTree,
}

/// One replica's copy of the shared state tree.
///
/// Writes go through [`Store::set`] (or a [`NodeRef`] handle). Each write
/// wraps nested values depth-first, stores them, emits one [`Change`] on
/// the change stream, and synchronously notifies bindings along the
/// written path before returning.
///
/// Stores are constructed explicitly and shared as `Arc<Store>`; there is
/// no process-wide instance.
pub struct Store {
    role: Role,
    inner: RwLock<StoreInner>,
    change_tx: broadcast::Sender<Change>,
    ready_tx: watch::Sender<bool>,
    write_tx: watch::Sender<u64>,
}

impl Store {
    pub fn new(role: Role) -> Arc<Self> {
        let (change_tx, _) = broadcast::channel(CHANGE_BUFFER);
        let (ready_tx, _) = watch::channel(matches!(role, Role::Local));
        let (write_tx, _) = watch::channel(0);
        Arc::new(Self {
            role,
            inner: RwLock::new(StoreInner {
                root: Node::root(),
                bindings: BindingTree::new(),
            }),
            change_tx,
            ready_tx,
            write_tx,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    /// Write `value` under `key` in the container at `parent`.
    ///
    /// Fails fast when `parent` does not name a wrapped container —
    /// writing to an unreplicated branch is an integration bug that must
    /// surface immediately.
    pub fn set(&self, parent: &Path, key: impl Into<Key>, value: Value) -> Result<()> {
        let key = key.into();
        let path = parent.child(key.clone());

        let (payload, notifications) = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;

            let target = locate_mut(&mut inner.root, parent)?;
            let slot = Node::wrap(path.clone(), value);
            let payload = slot.strip();
            target.insert(key, slot);

            // Pair each bound callback with the current value at its depth,
            // walking the binding tree and the data tree in lockstep.
            let mut notifications = Vec::new();
            for (depth, callback) in inner.bindings.along(&path) {
                let at = path.prefix(depth);
                match inner.root.value_at(&at) {
                    Some(value) => notifications.push((at, callback, value)),
                    None => break,
                }
            }
            (payload, notifications)
        };

        debug!(path = %path, "write applied");
        let _ = self.change_tx.send(Change {
            path,
            value: payload,
        });
        for (at, callback, value) in &notifications {
            dispatch(at, callback, value);
        }
        self.write_tx.send_modify(|n| *n += 1);
        Ok(())
    }

    /// Apply a full-path write: walk all but the last segment to the
    /// parent container, then set the final key through the normal write
    /// path. Remote-origin and local-origin writes are indistinguishable
    /// to bindings.
    pub fn set_path(&self, path: &Path, value: Value) -> Result<()> {
        let (parent, last) = path.split_last().ok_or(StoreError::RootWrite)?;
        self.set(&parent, last.clone(), value)
    }

    /// Stripped value at `path`; `None` when the path does not resolve.
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.inner.read().root.value_at(path)
    }

    /// The entire current tree as a plain mirror.
    pub fn snapshot(&self) -> Value {
        self.inner.read().root.strip()
    }

    /// Merge a full-state snapshot.
    ///
    /// Each top-level key is replaced wholesale through the normal write
    /// path, so wrapping and binding notification apply exactly as for
    /// incremental writes. Nested state under a replaced key is discarded,
    /// not deep-merged.
    pub fn apply_snapshot(&self, state: Value) -> Result<()> {
        let entries = match state {
            Value::Map(entries) => entries,
            _ => return Err(StoreError::MalformedSnapshot),
        };
        for (key, value) in entries {
            self.set(&Path::root(), key, value)?;
        }
        Ok(())
    }

    /// Register `callback` for changes at `path`, replacing any previous
    /// callback there (last bind wins).
    pub fn bind_on_change(&self, path: &Path, callback: impl Fn(&Value) + Send + Sync + 'static) {
        self.inner.write().bindings.bind(path, Arc::new(callback));
    }

    /// Clear the callback at exactly `path`.
    pub fn unbind(&self, path: &Path) {
        self.inner.write().bindings.unbind(path);
    }

    /// Subscribe to the change stream: one event per write, in write order.
    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.change_tx.subscribe()
    }

    /// Flag the store ready: the root is wrapped and (for tracking stores)
    /// the initial snapshot has been merged.
    pub fn mark_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    /// Drop readiness, e.g. after a lost connection. The store stops
    /// serving waits until a fresh snapshot succeeds.
    pub fn reset_ready(&self) {
        self.ready_tx.send_replace(false);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Resolve once the readiness flag is observed true. A condition wait,
    /// not a spin loop.
    pub async fn ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Resolve once the named top-level key is present and non-null.
    ///
    /// The caller is parked on the store's write signal; a store that is
    /// not ready does not serve waits until it becomes ready.
    pub async fn wait(&self, key: impl Into<Key>) -> Value {
        let path = Path::root().child(key);
        let mut ready_rx = self.ready_tx.subscribe();
        let mut write_rx = self.write_tx.subscribe();
        loop {
            write_rx.borrow_and_update();
            if *ready_rx.borrow_and_update() {
                if let Some(value) = self.get(&path) {
                    if !value.is_null() {
                        return value;
                    }
                }
            }
            tokio::select! {
                _ = write_rx.changed() => {}
                _ = ready_rx.changed() => {}
            }
        }
    }

    /// A handle to the wrapped container at `path`; fails fast when the
    /// path is missing or leads through a leaf.
    pub fn handle(self: &Arc<Self>, path: Path) -> Result<NodeRef> {
        locate(&self.inner.read().root, &path)?;
        Ok(NodeRef {
            store: self.clone(),
            path,
        })
    }

    /// A handle to the root container.
    pub fn root_handle(self: &Arc<Self>) -> NodeRef {
        NodeRef {
            store: self.clone(),
            path: Path::root(),
        }
    }
}

/// Descend to the container at `path`, failing fast on the first segment
/// that is missing or not a branch.
fn locate<'a>(root: &'a Node, path: &Path) -> Result<&'a Node> {
    let mut current = root;
    for (depth, key) in path.segments().iter().enumerate() {
        match current.slot(key) {
            Some(Slot::Branch(node)) => current = node,
            Some(Slot::Leaf(_)) => {
                return Err(StoreError::NotAContainer(path.prefix(depth + 1).to_string()))
            }
            None => return Err(StoreError::PathNotFound(path.prefix(depth + 1).to_string())),
        }
    }
    Ok(current)
}

fn locate_mut<'a>(root: &'a mut Node, path: &Path) -> Result<&'a mut Node> {
    let mut current = root;
    for (depth, key) in path.segments().iter().enumerate() {
        match current.slot_mut(key) {
            Some(Slot::Branch(node)) => current = node,
            Some(Slot::Leaf(_)) => {
                return Err(StoreError::NotAContainer(path.prefix(depth + 1).to_string()))
            }
            None => return Err(StoreError::PathNotFound(path.prefix(depth + 1).to_string())),
        }
    }
    Ok(current)
}

/// A handle to one wrapped subtree.
///
/// All writes go through [`NodeRef::set`]; there is no assignment-style
/// interception in this design.
#[derive(Clone)]
pub struct NodeRef {
    store: Arc<Store>,
    path: Path,
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef").field("path", &self.path).finish()
    }
}

impl NodeRef {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.store.get(&self.path.child(key))
    }

    pub fn set(&self, key: impl Into<Key>, value: Value) -> Result<()> {
        self.store.set(&self.path, key, value)
    }

    /// Handle to a wrapped child container.
    pub fn child(&self, key: impl Into<Key>) -> Result<NodeRef> {
        self.store.handle(self.path.child(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    fn profile_value() -> Value {
        Value::from_iter([("Level", Value::Int(1))])
    }

    #[test]
    fn test_set_emits_change_with_plain_payload() {
        let store = Store::new(Role::Authority);
        let mut changes = store.changes();

        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        let change = changes.try_recv().unwrap();
        assert_eq!(change.path, Path::parse("Profile"));
        assert_eq!(change.value, profile_value());
    }

    #[test]
    fn test_nested_set_emits_bare_scalar() {
        let store = Store::new(Role::Authority);
        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        let mut changes = store.changes();
        let profile = store.handle(Path::parse("Profile")).unwrap();
        profile.set("Level", Value::Int(2)).unwrap();

        let change = changes.try_recv().unwrap();
        assert_eq!(change.path, Path::parse("Profile.Level"));
        // The delta carries only the written scalar, not the whole table.
        assert_eq!(change.value, Value::Int(2));
        assert_eq!(
            store.get(&Path::parse("Profile.Level")),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn test_write_through_missing_branch_fails_fast() {
        let store = Store::new(Role::Authority);
        let err = store
            .set(&Path::parse("Missing"), "x", Value::Int(1))
            .unwrap_err();
        assert_eq!(err, StoreError::PathNotFound("Missing".to_string()));
    }

    #[test]
    fn test_write_through_leaf_fails_fast() {
        let store = Store::new(Role::Authority);
        store.set(&Path::root(), "name", Value::from("A")).unwrap();
        let err = store
            .set(&Path::parse("name"), "first", Value::from("B"))
            .unwrap_err();
        assert_eq!(err, StoreError::NotAContainer("name".to_string()));
    }

    #[test]
    fn test_bindings_fire_along_path_outermost_first() {
        let store = Store::new(Role::Local);
        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        for bound in ["Profile", "Profile.Level"] {
            let seen = seen.clone();
            store.bind_on_change(&Path::parse(bound), move |value| {
                seen.lock().push((bound.to_string(), value.clone()));
            });
        }

        store
            .set(&Path::parse("Profile"), "Level", Value::Int(2))
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "Profile");
        assert_eq!(
            seen[0].1,
            Value::from_iter([("Level", Value::Int(2))])
        );
        assert_eq!(seen[1].0, "Profile.Level");
        assert_eq!(seen[1].1, Value::Int(2));
    }

    #[test]
    fn test_panicking_binding_does_not_abort_write() {
        let store = Store::new(Role::Local);
        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        store.bind_on_change(&Path::parse("Profile"), |_| panic!("listener defect"));
        let fired = Arc::new(Mutex::new(false));
        {
            let fired = fired.clone();
            store.bind_on_change(&Path::parse("Profile.Level"), move |_| {
                *fired.lock() = true;
            });
        }

        store
            .set(&Path::parse("Profile"), "Level", Value::Int(9))
            .unwrap();

        assert!(*fired.lock());
        assert_eq!(
            store.get(&Path::parse("Profile.Level")),
            Some(Value::Int(9))
        );
    }

    #[test]
    fn test_apply_snapshot_wraps_deeply() {
        let store = Store::new(Role::Tracking);
        let snapshot = Value::from_iter([(
            "Profile",
            Value::from_iter([("Stats", Value::from_iter([("Hp", Value::Int(100))]))]),
        )]);

        store.apply_snapshot(snapshot.clone()).unwrap();
        assert_eq!(store.snapshot(), snapshot);

        // Snapshot subtrees are wrapped: deep writes through them work.
        let stats = store.handle(Path::parse("Profile.Stats")).unwrap();
        stats.set("Hp", Value::Int(75)).unwrap();
        assert_eq!(
            store.get(&Path::parse("Profile.Stats.Hp")),
            Some(Value::Int(75))
        );
    }

    #[test]
    fn test_apply_snapshot_rejects_non_map() {
        let store = Store::new(Role::Tracking);
        assert_eq!(
            store.apply_snapshot(Value::Int(3)),
            Err(StoreError::MalformedSnapshot)
        );
    }

    #[test]
    fn test_snapshot_replaces_top_level_keys() {
        let store = Store::new(Role::Tracking);
        store
            .set(
                &Path::root(),
                "Profile",
                Value::from_iter([("Stale", Value::Int(1))]),
            )
            .unwrap();

        store
            .apply_snapshot(Value::from_iter([("Profile", profile_value())]))
            .unwrap();

        // Replace, not deep-merge: the stale subtree is gone.
        assert_eq!(store.get(&Path::parse("Profile.Stale")), None);
        assert_eq!(
            store.get(&Path::parse("Profile.Level")),
            Some(Value::Int(1))
        );
    }

    #[tokio::test]
    async fn test_wait_resolves_on_write() {
        let store = Store::new(Role::Local);
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait("Profile").await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        let value = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait must resolve after the write")
            .unwrap();
        assert_eq!(value, profile_value());
    }

    #[tokio::test]
    async fn test_wait_gated_on_readiness() {
        let store = Store::new(Role::Tracking);
        store
            .set(&Path::root(), "Profile", profile_value())
            .unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait("Profile").await })
        };

        // Value present but the store is not ready: the wait stalls.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        store.mark_ready();
        let value = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait must resolve once ready")
            .unwrap();
        assert_eq!(value, profile_value());
    }

    #[test]
    fn test_handle_fails_fast_on_missing_path() {
        let store = Store::new(Role::Local);
        assert_eq!(
            store.handle(Path::parse("Nope")).unwrap_err(),
            StoreError::PathNotFound("Nope".to_string())
        );
    }

    #[test]
    fn test_local_store_is_live_at_construction() {
        assert!(Store::new(Role::Local).is_ready());
        assert!(!Store::new(Role::Authority).is_ready());
        assert!(!Store::new(Role::Tracking).is_ready());
    }
}
