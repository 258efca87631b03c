use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{Error, Result};

/// Identifier of a single path element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// Numeric id, usually assigned by the service
    Id(i64),
    /// Caller-chosen string name
    Name(String),
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

/// One `(kind, identifier)` segment of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    /// None = incomplete, awaiting a server-assigned id
    pub identifier: Option<Identifier>,
}

impl PathElement {
    pub fn new(kind: impl Into<String>, identifier: impl Into<Identifier>) -> Self {
        Self {
            kind: kind.into(),
            identifier: Some(identifier.into()),
        }
    }

    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identifier: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.identifier.is_some()
    }
}

/// Hierarchical entity key: ancestor path ending with the entity's own segment.
///
/// A key carries no dataset id; the dataset is supplied when the key is encoded.
/// Only the last element may be incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub namespace: Option<String>,
    pub path: Vec<PathElement>,
}

impl Key {
    /// Complete single-element key
    pub fn new(kind: impl Into<String>, identifier: impl Into<Identifier>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::new(kind, identifier)],
        }
    }

    /// Single-element key without an identifier
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::incomplete(kind)],
        }
    }

    /// Build a key from an explicit path, checking the path invariants.
    pub fn from_path(path: Vec<PathElement>) -> Result<Self> {
        let key = Self {
            namespace: None,
            path,
        };
        key.validate()?;
        Ok(key)
    }

    /// Append a complete child segment
    pub fn child(mut self, kind: impl Into<String>, identifier: impl Into<Identifier>) -> Self {
        self.path.push(PathElement::new(kind, identifier));
        self
    }

    /// Append an incomplete child segment
    pub fn incomplete_child(mut self, kind: impl Into<String>) -> Self {
        self.path.push(PathElement::incomplete(kind));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Kind of the last path element
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|e| e.kind.as_str())
    }

    /// Identifier of the last path element
    pub fn identifier(&self) -> Option<&Identifier> {
        self.path.last().and_then(|e| e.identifier.as_ref())
    }

    /// Key of the enclosing ancestor, None for a root key
    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Key {
            namespace: self.namespace.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// True iff no element's identifier is absent
    pub fn is_complete(&self) -> bool {
        self.path.iter().all(PathElement::is_complete)
    }

    /// Check the path invariants: non-empty, only the last element incomplete.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::Validation("key path is empty".to_string()));
        }

        let last = self.path.len() - 1;
        if let Some(pos) = self.path[..last].iter().position(|e| !e.is_complete()) {
            return Err(Error::Validation(format!(
                "key {} has an incomplete element at position {}; only the last element may be incomplete",
                self, pos
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{}:", ns)?;
        }
        for (i, element) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match &element.identifier {
                Some(Identifier::Id(id)) => write!(f, "{}:{}", element.kind, id)?,
                Some(Identifier::Name(name)) => write!(f, "{}:'{}'", element.kind, name)?,
                None => write!(f, "{}:?", element.kind)?,
            }
        }
        Ok(())
    }
}

/// Typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    /// UTC instant, microsecond precision on the wire
    Timestamp(DateTime<Utc>),
    /// Reference to another entity
    Key(Key),
    Blob(Bytes),
    /// Embedded entity without identity
    Entity(Entity),
    List(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Integer when `n` has no fractional part and fits an i64, Double otherwise.
    pub fn from_number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            Value::Integer(n as i64)
        } else {
            Value::Double(n)
        }
    }

    pub fn blob(b: impl Into<Bytes>) -> Self {
        Value::Blob(b.into())
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect())
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        Value::Key(k)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

/// Entity - a map of property names to values
pub type Entity = HashMap<String, Value>;


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn path_element() -> impl Strategy<Value = PathElement> {
        let identifier = prop_oneof![
            Just(None),
            any::<i64>().prop_map(|id| Some(Identifier::Id(id))),
            "[a-z]{1,8}".prop_map(|name| Some(Identifier::Name(name))),
        ];
        ("[A-Z][a-z]{0,6}", identifier).prop_map(|(kind, identifier)| PathElement { kind, identifier })
    }

    proptest! {
        #[test]
        fn prop_only_last_element_may_be_incomplete(path in prop::collection::vec(path_element(), 0..5)) {
            let expected = !path.is_empty()
                && path[..path.len() - 1].iter().all(PathElement::is_complete);
            let key = Key { namespace: None, path: path.clone() };

            prop_assert_eq!(key.validate().is_ok(), expected);
            prop_assert_eq!(Key::from_path(path).is_ok(), expected);
        }

        #[test]
        fn prop_completeness_follows_every_element(path in prop::collection::vec(path_element(), 1..5)) {
            let expected = path.iter().all(PathElement::is_complete);
            let key = Key { namespace: None, path };
            prop_assert_eq!(key.is_complete(), expected);
        }
    }
}
