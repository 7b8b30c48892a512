//! The wrapped state tree: nested values with absolute path tracking.

use pdss_core::{Key, Path, Value};
use std::collections::BTreeMap;

/// A slot in a node's variable table.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    /// Scalar or opaque reference, stored as-is.
    Leaf(Value),
    /// Nested structure, wrapped with its own absolute path.
    Branch(Node),
}

impl Slot {
    /// The plain mirror of this slot. Opaque references pass through
    /// untouched.
    pub fn strip(&self) -> Value {
        match self {
            Slot::Leaf(value) => value.clone(),
            Slot::Branch(node) => node.strip(),
        }
    }
}

/// One wrapped (sub)table of replicated state.
///
/// Every nested structure reachable from the root is wrapped into exactly
/// one node, and a child's path equals its parent's path plus the child
/// key. Wrapping consumes plain [`Value`]s only, so a wrapped subtree can
/// never be wrapped a second time.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    path: Path,
    vars: BTreeMap<Key, Slot>,
}

impl Node {
    /// An empty root node.
    pub fn root() -> Self {
        Self {
            path: Path::root(),
            vars: BTreeMap::new(),
        }
    }

    /// Wrap a plain value for storage at `path`.
    ///
    /// Maps become [`Slot::Branch`] nodes, children first (depth-first),
    /// each child at `path` plus its key. Scalars and opaque references
    /// become [`Slot::Leaf`] and are never recursed into.
    pub fn wrap(path: Path, value: Value) -> Slot {
        match value {
            Value::Map(entries) => {
                let vars = entries
                    .into_iter()
                    .map(|(key, child)| {
                        let slot = Node::wrap(path.child(key.clone()), child);
                        (key, slot)
                    })
                    .collect();
                Slot::Branch(Node { path, vars })
            }
            leaf => Slot::Leaf(leaf),
        }
    }

    /// Absolute path of this node, fixed at wrap time.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Produce the plain nested mirror of this node's variables.
    ///
    /// Used for outgoing incremental payloads and full-store snapshots.
    pub fn strip(&self) -> Value {
        Value::Map(
            self.vars
                .iter()
                .map(|(key, slot)| (key.clone(), slot.strip()))
                .collect(),
        )
    }

    /// Stripped view of one variable.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.vars.get(key).map(Slot::strip)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.vars.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.vars.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub(crate) fn slot(&self, key: &Key) -> Option<&Slot> {
        self.vars.get(key)
    }

    pub(crate) fn slot_mut(&mut self, key: &Key) -> Option<&mut Slot> {
        self.vars.get_mut(key)
    }

    pub(crate) fn insert(&mut self, key: Key, slot: Slot) {
        self.vars.insert(key, slot);
    }

    /// The wrapped node at `path`, if every segment leads through a branch.
    pub fn node_at(&self, path: &Path) -> Option<&Node> {
        let mut current = self;
        for key in path.segments() {
            match current.slot(key)? {
                Slot::Branch(node) => current = node,
                Slot::Leaf(_) => return None,
            }
        }
        Some(current)
    }

    /// Stripped value at `path`; the root path yields the whole mirror.
    pub fn value_at(&self, path: &Path) -> Option<Value> {
        let (parent, last) = match path.split_last() {
            Some(split) => split,
            None => return Some(self.strip()),
        };
        self.node_at(&parent)?.get(last)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::root()
    }
}
