//! State Records
//!
//! A `Snapshot` is one immutable state record: an ordered map from field
//! keys to [`Field`]s. A `Field` is either a plain [`Value`] or a tagged
//! derivation node; the tag is only ever inspected at the view boundary,
//! which resolves nodes into ordinary values before anything else sees
//! them.
//!
//! Reading a field directly on a `Snapshot` (rather than through a
//! [`StateView`](crate::store::StateView)) returns the tagged `Field`,
//! derivation node and all. That is a contract note, not an error: raw
//! snapshots do not resolve or track anything.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::BoxError;
use crate::node::{ComputedNode, WatchNode};
use crate::store::view::StateView;
use crate::value::{FieldKey, Value};

/// One field of a state record: a plain value or a tagged derivation node.
#[derive(Clone)]
pub enum Field {
    /// A plain stored value.
    Value(Value),
    /// An auto-tracked derived field.
    Computed(Arc<ComputedNode>),
    /// An explicitly-selected derived field.
    Watch(Arc<WatchNode>),
}

impl Field {
    /// Check if this field is derived (either variant).
    pub fn is_derived(&self) -> bool {
        !matches!(self, Field::Value(_))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => fmt::Debug::fmt(v, f),
            Field::Computed(node) => fmt::Debug::fmt(node, f),
            Field::Watch(node) => fmt::Debug::fmt(node, f),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Value(value.into())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Value(value.into())
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Value(value.into())
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Value(value.into())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Value(value.into())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Value(value.into())
    }
}

/// Mark a field as auto-tracked derived state.
///
/// The returned [`Field`] can be inserted into a state record like any
/// plain value. `compute` runs lazily, on the first read of the field, and
/// again only when one of the fields it read last time has changed.
pub fn computed<F>(compute: F) -> Field
where
    F: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    Field::Computed(Arc::new(ComputedNode::new(compute)))
}

/// Mark a field as derived state with an explicit selection.
///
/// `selector` extracts the watched selection; `compute` runs only when the
/// selection changes by [`Value`] equality. Use [`watch_with`] to supply a
/// custom equality.
pub fn watch<S, C>(selector: S, compute: C) -> Field
where
    S: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
    C: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    Field::Watch(Arc::new(WatchNode::new(selector, compute)))
}

/// Like [`watch`], with a custom selection equality function.
pub fn watch_with<S, C, E>(selector: S, compute: C, eq: E) -> Field
where
    S: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
    C: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    E: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    Field::Watch(Arc::new(WatchNode::with_eq(selector, compute, eq)))
}

/// One immutable state record.
///
/// Snapshots are immutable by convention: an update produces a new
/// `Snapshot`, never mutates an existing one. Derived fields carried over
/// into the new snapshot share their node `Arc`s, which is what lets a
/// node's cache survive across updates.
#[derive(Debug, Default)]
pub struct Snapshot {
    fields: IndexMap<FieldKey, Field>,
}

impl Snapshot {
    /// Build a snapshot from `(key, field)` pairs.
    pub fn from_fields<I, K, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<FieldKey>,
        F: Into<Field>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, field)| (key.into(), field.into()))
                .collect(),
        }
    }

    /// Raw access to one field.
    ///
    /// For a derived field this returns the tagged node, not its resolved
    /// value; resolution only happens through a state view.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Raw access returning the stored key alongside the field.
    pub(crate) fn entry(&self, key: &str) -> Option<(&FieldKey, &Field)> {
        self.fields.get_key_value(key)
    }

    /// Keys of this record, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build the successor snapshot with `updates` shallow-merged in.
    ///
    /// Updated keys overwrite existing fields (including derived ones,
    /// object-assign style); unknown keys are appended. Everything else is
    /// carried over, derived fields by `Arc` clone.
    pub(crate) fn merged<I>(&self, updates: I) -> Snapshot
    where
        I: IntoIterator<Item = (FieldKey, Field)>,
    {
        let mut fields = self.fields.clone();
        for (key, field) in updates {
            fields.insert(key, field);
        }
        Snapshot { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_access_returns_the_tagged_field() {
        let snapshot = Snapshot::from_fields([
            ("a", Field::from(1)),
            ("b", computed(|_| Ok(Value::from(2)))),
        ]);

        assert!(!snapshot.field("a").unwrap().is_derived());
        assert!(snapshot.field("b").unwrap().is_derived());
        assert!(snapshot.field("missing").is_none());
    }

    #[test]
    fn merge_overwrites_and_appends_in_order() {
        let snapshot = Snapshot::from_fields([("a", 1), ("b", 2)]);
        let next = snapshot.merged([
            (FieldKey::from("b"), Field::from(20)),
            (FieldKey::from("c"), Field::from(30)),
        ]);

        let keys: Vec<_> = next.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(next.len(), 3);
    }

    #[test]
    fn merge_shares_derivation_nodes() {
        let snapshot = Snapshot::from_fields([("d", computed(|_| Ok(Value::Null)))]);
        let next = snapshot.merged([]);

        let (a, b) = match (snapshot.field("d"), next.field("d")) {
            (Some(Field::Computed(a)), Some(Field::Computed(b))) => (a, b),
            _ => panic!("expected computed fields"),
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn debug_never_leaks_node_internals() {
        let snapshot = Snapshot::from_fields([("d", computed(|_| Ok(Value::from(5))))]);
        let rendered = format!("{:?}", snapshot.field("d").unwrap());
        assert!(rendered.starts_with("ComputedNode"));
        assert!(!rendered.contains('5'));
    }
}
