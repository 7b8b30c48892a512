//! Paths into nested replicated state.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One step in a [`Path`]: a string key or an integer index.
///
/// Serialized in display form; strings that parse as integers deserialize
/// back as [`Key::Index`], matching [`Path::parse`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// String key.
    Text(String),
    /// Integer key.
    Index(i64),
}

impl Key {
    /// Parse a single segment: integers become indexes, everything else text.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(idx) => Key::Index(idx),
            Err(_) => Key::Text(segment.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s),
            Key::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Text(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => write!(f, "{}", s),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Index(i)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(D::Error::custom("empty path segment"));
        }
        Ok(Key::parse(&s))
    }
}

/// An ordered sequence of keys from the store root to a nested value.
///
/// A path is computed once, when a value is wrapped into the state tree,
/// and never changes afterwards. Appending returns a new path; the
/// receiver is left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Key>);

impl Path {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from segments.
    pub fn new(segments: Vec<Key>) -> Self {
        Self(segments)
    }

    /// Parse dot notation (e.g., "profile.name" or "items.0.value").
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self(path.split('.').map(Key::parse).collect())
    }

    pub fn segments(&self) -> &[Key] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its final segment; `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

    /// Append one key, returning a new path (the receiver is not mutated).
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    /// Split into the parent path and the final key; `None` at the root.
    pub fn split_last(&self) -> Option<(Self, &Key)> {
        let last = self.0.last()?;
        Some((Self(self.0[..self.0.len() - 1].to_vec()), last))
    }

    /// The prefix holding the first `depth` segments.
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", s.join("."))
    }
}

impl<K: Into<Key>> FromIterator<K> for Path {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
