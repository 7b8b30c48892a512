//! Plain nested values — the wire form of replicated state.

use crate::error::{CoreError, Result};
use crate::path::{Key, Path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// A reference to a live object that must never be replicated.
///
/// Opaque references are passed through serialization unchanged and are
/// never recursed into. Equality is identity: two references are equal
/// exactly when their ids match, so the canonical reference survives a
/// round trip over the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpaqueRef {
    id: String,
    label: Option<String>,
}

impl OpaqueRef {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            label: None,
        }
    }

    /// An opaque reference carrying a human-readable label for logs.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            label: Some(label.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Default for OpaqueRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueRef {}

impl std::hash::Hash for OpaqueRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A plain nested value: scalar, map, or opaque reference.
///
/// This is the unwrapped mirror of wrapped state — what travels in
/// incremental deltas and full snapshots.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Text(String),
    /// Nested structure.
    Map(BTreeMap<Key, Value>),
    /// Non-replicable reference, passed through untouched.
    Opaque(OpaqueRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Key, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Walk a key sequence into this value.
    ///
    /// Opaque references are never entered: any path leading through one
    /// resolves to `None`.
    pub fn get_in(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for key in path.segments() {
            match current {
                Value::Map(map) => current = map.get(key)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Walk all but the last segment and set the final key.
    ///
    /// Missing intermediate segments fail fast with
    /// [`CoreError::PathNotFound`]; traversing through a non-map fails with
    /// [`CoreError::NotAContainer`]. The final key may be new.
    pub fn set_in(&mut self, path: &Path, value: Value) -> Result<()> {
        let (parent, last) = path.split_last().ok_or(CoreError::RootPath)?;

        let mut current = self;
        for (depth, key) in parent.segments().iter().enumerate() {
            let map = match current {
                Value::Map(map) => map,
                _ => return Err(CoreError::NotAContainer(path.prefix(depth).to_string())),
            };
            current = map
                .get_mut(key)
                .ok_or_else(|| CoreError::PathNotFound(path.prefix(depth + 1).to_string()))?;
        }

        match current {
            Value::Map(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            _ => Err(CoreError::NotAContainer(parent.to_string())),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Opaque(o) => match o.label() {
                Some(label) => write!(f, "<opaque {}>", label),
                None => write!(f, "<opaque {}>", o.id()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<OpaqueRef> for Value {
    fn from(o: OpaqueRef) -> Self {
        Value::Opaque(o)
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::from_iter([
            ("name", Value::from("Alice")),
            ("profile", Value::from_iter([("level", Value::Int(3))])),
        ])
    }

    #[test]
    fn test_get_in_nested() {
        let value = sample();
        let level = value.get_in(&Path::parse("profile.level")).unwrap();
        assert_eq!(level.as_int(), Some(3));
        assert!(value.get_in(&Path::parse("profile.missing")).is_none());
    }

    #[test]
    fn test_get_in_root() {
        let value = sample();
        assert_eq!(value.get_in(&Path::root()), Some(&value));
    }

    #[test]
    fn test_set_in_new_key() {
        let mut value = sample();
        value
            .set_in(&Path::parse("profile.xp"), Value::Int(120))
            .unwrap();
        assert_eq!(
            value.get_in(&Path::parse("profile.xp")).unwrap().as_int(),
            Some(120)
        );
    }

    #[test]
    fn test_set_in_missing_intermediate_fails_fast() {
        let mut value = sample();
        let err = value
            .set_in(&Path::parse("inventory.slots.0"), Value::Int(1))
            .unwrap_err();
        assert_eq!(err, CoreError::PathNotFound("inventory".to_string()));
    }

    #[test]
    fn test_set_in_through_scalar_fails() {
        let mut value = sample();
        let err = value
            .set_in(&Path::parse("name.first"), Value::from("A"))
            .unwrap_err();
        assert_eq!(err, CoreError::NotAContainer("name".to_string()));
    }

    #[test]
    fn test_set_in_root_rejected() {
        let mut value = sample();
        assert_eq!(
            value.set_in(&Path::root(), Value::Null),
            Err(CoreError::RootPath)
        );
    }

    #[test]
    fn test_opaque_identity() {
        let opaque = OpaqueRef::labeled("npc-handle");
        let clone = opaque.clone();
        assert_eq!(opaque, clone);
        assert_ne!(opaque, OpaqueRef::new());
    }

    #[test]
    fn test_opaque_never_entered() {
        let value = Value::from_iter([("handle", Value::Opaque(OpaqueRef::new()))]);
        assert!(value.get_in(&Path::parse("handle.anything")).is_none());
    }

    #[test]
    fn test_opaque_serde_round_trip() {
        let opaque = OpaqueRef::labeled("spawn-point");
        let json = serde_json::to_string(&Value::Opaque(opaque.clone())).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_opaque(), Some(&opaque));
    }
}
