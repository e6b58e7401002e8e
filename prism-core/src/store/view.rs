//! State Views
//!
//! A `StateView` is the read-intercepting facade over exactly one raw
//! snapshot. Every field read goes through [`StateView::get`], which does
//! three things the raw snapshot cannot:
//!
//! 1. Resolve derivation nodes transparently. A consumer cannot tell a
//!    resolved derived field from a plain one by reading it.
//! 2. Report the resolved read to the tracking context, so the innermost
//!    in-flight derivation records it as a dependency.
//! 3. Hand derivation nodes the *view* (not the raw snapshot), so the
//!    reads their computations perform are themselves intercepted.
//!
//! Views carry no data of their own beyond the snapshot reference, but
//! their *identity* matters: derivation nodes use it for their O(1) fast
//! path. The [`ViewCache`](crate::store::ViewCache) guarantees one view
//! allocation per snapshot.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::store::state::{Field, Snapshot};
use crate::track;
use crate::value::{FieldKey, Value};

/// Shared interior of a view. One allocation per snapshot; derivation
/// nodes compare these allocations by pointer.
pub(crate) struct ViewInner {
    snapshot: Arc<Snapshot>,
}

/// The read-through facade over one raw snapshot.
///
/// Cheap to clone; clones share the same identity.
#[derive(Clone)]
pub struct StateView {
    inner: Arc<ViewInner>,
}

impl StateView {
    /// Build a fresh view over `snapshot`.
    ///
    /// Store code goes through the view cache instead, so one snapshot
    /// never ends up with two view identities.
    pub(crate) fn over(snapshot: Arc<Snapshot>) -> Self {
        Self {
            inner: Arc::new(ViewInner { snapshot }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ViewInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ViewInner> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<ViewInner> {
        Arc::downgrade(&self.inner)
    }

    /// The raw snapshot underneath this view.
    ///
    /// Reads on the raw snapshot are neither resolved nor tracked; derived
    /// fields come back as tagged nodes.
    pub fn raw(&self) -> &Snapshot {
        &self.inner.snapshot
    }

    /// Read one field, resolving derivations and recording the read.
    ///
    /// For a plain field the stored value is returned. For a derived field
    /// the node is resolved against this view, which may recursively read
    /// (and resolve) other fields. Either way the resolved value is
    /// reported to the tracking context before being returned.
    pub fn get(&self, key: &str) -> Result<Value, StoreError> {
        let (key, field) = self
            .inner
            .snapshot
            .entry(key)
            .ok_or_else(|| StoreError::UnknownField(Arc::from(key)))?;

        let value = match field {
            Field::Value(v) => v.clone(),
            Field::Computed(node) => {
                node.resolve(self).map_err(|source| StoreError::Derivation {
                    field: key.clone(),
                    source,
                })?
            }
            Field::Watch(node) => {
                node.resolve(self).map_err(|source| StoreError::Derivation {
                    field: key.clone(),
                    source,
                })?
            }
        };

        track::record(key, &value);
        Ok(value)
    }

    /// Resolve every field into a plain [`Value::Map`].
    ///
    /// This is the sanctioned way to move a whole snapshot across the view
    /// boundary (serialization, logging, equality checks on output): only
    /// resolved values appear, never node wrappers.
    pub fn to_value(&self) -> Result<Value, StoreError> {
        let mut map = IndexMap::with_capacity(self.len());
        for key in self.raw().keys() {
            map.insert(key.clone(), self.get(key)?);
        }
        Ok(Value::Map(Arc::new(map)))
    }

    /// Keys of the underlying snapshot, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.inner.snapshot.keys()
    }

    /// Check whether the snapshot has a field named `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.snapshot.field(key).is_some()
    }

    /// Number of fields in the underlying snapshot.
    pub fn len(&self) -> usize {
        self.inner.snapshot.len()
    }

    /// Check whether the underlying snapshot has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.snapshot.is_empty()
    }
}

impl std::fmt::Debug for StateView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateView")
            .field("fields", &self.len())
            .finish()
    }
}
