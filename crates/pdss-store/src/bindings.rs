//! Path-indexed change-notification tree.

use pdss_core::{Key, Path, Value};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// A change callback, invoked with the current value at its bound path.
pub type BindingFn = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct BindingNode {
    callback: Option<BindingFn>,
    children: BTreeMap<Key, BindingNode>,
}

/// A tree of optional change callbacks mirroring the shape of the data.
///
/// Each path holds at most one callback; binding the same path again
/// replaces the previous callback. Fan-out at a single path is left to
/// the caller by design.
#[derive(Default)]
pub struct BindingTree {
    root: BindingNode,
}

impl BindingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk from the root, creating intermediate nodes on demand, and set
    /// the terminal callback. Last bind wins.
    pub fn bind(&mut self, path: &Path, callback: BindingFn) {
        let mut current = &mut self.root;
        for key in path.segments() {
            current = current.children.entry(key.clone()).or_default();
        }
        current.callback = Some(callback);
    }

    /// Clear the callback at exactly `path`. Bindings above or below it
    /// are unaffected.
    pub fn unbind(&mut self, path: &Path) {
        let mut current = &mut self.root;
        for key in path.segments() {
            match current.children.get_mut(key) {
                Some(child) => current = child,
                None => return,
            }
        }
        current.callback = None;
    }

    /// Collect the callbacks along `path`, outermost first, paired with
    /// the 1-based depth each one is bound at. The walk stops at the first
    /// segment with no binding node — no one is listening deeper.
    pub(crate) fn along(&self, path: &Path) -> Vec<(usize, BindingFn)> {
        let mut found = Vec::new();
        let mut current = &self.root;
        for (depth, key) in path.segments().iter().enumerate() {
            match current.children.get(key) {
                Some(child) => current = child,
                None => break,
            }
            if let Some(callback) = &current.callback {
                found.push((depth + 1, callback.clone()));
            }
        }
        found
    }
}

/// Invoke one binding, isolating failures: a panicking callback is logged
/// and must not abort the write that triggered it or the remaining
/// notifications.
pub(crate) fn dispatch(path: &Path, callback: &BindingFn, value: &Value) {
    if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
        warn!(path = %path, "change callback panicked; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_last_bind_wins() {
        let mut tree = BindingTree::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        for counter in [first.clone(), second.clone()] {
            tree.bind(
                &Path::parse("profile.level"),
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        let callbacks = tree.along(&Path::parse("profile.level"));
        assert_eq!(callbacks.len(), 1);
        (callbacks[0].1)(&Value::Null);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callbacks_along_prefix_depths() {
        let mut tree = BindingTree::new();
        tree.bind(&Path::parse("a"), Arc::new(|_| {}));
        tree.bind(&Path::parse("a.b.c"), Arc::new(|_| {}));

        let along = tree.along(&Path::parse("a.b.c"));
        let depths: Vec<usize> = along.iter().map(|(depth, _)| *depth).collect();
        assert_eq!(depths, vec![1, 3]);
    }

    #[test]
    fn test_walk_stops_at_missing_segment() {
        let mut tree = BindingTree::new();
        tree.bind(&Path::parse("a.x.deep"), Arc::new(|_| {}));

        // Nothing bound along a.b; the walk ends silently.
        assert!(tree.along(&Path::parse("a.b.c")).is_empty());
    }

    #[test]
    fn test_unbind_exact_path_only() {
        let mut tree = BindingTree::new();
        tree.bind(&Path::parse("a"), Arc::new(|_| {}));
        tree.bind(&Path::parse("a.b"), Arc::new(|_| {}));

        tree.unbind(&Path::parse("a"));

        let along = tree.along(&Path::parse("a.b"));
        assert_eq!(along.len(), 1);
        assert_eq!(along[0].0, 2);
    }

    #[test]
    fn test_dispatch_isolates_panics() {
        let path = Path::parse("boom");
        let callback: BindingFn = Arc::new(|_| panic!("listener defect"));
        // Must not propagate.
        dispatch(&path, &callback, &Value::Null);
    }
}
