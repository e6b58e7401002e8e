//! Dependency Records
//!
//! A `DependencyRecord` is the set of `(key, value)` pairs one derivation
//! read during a single evaluation. It is built fresh on every
//! recomputation and becomes the node's "previous" record once the
//! evaluation returns; the node later replays it against a new snapshot to
//! decide staleness.

use smallvec::SmallVec;

use crate::value::{FieldKey, Value};

/// The fields (and the values observed for them) read during one
/// evaluation of a derivation.
///
/// Keys are unique; insertion order is read order. Order is irrelevant to
/// correctness, only completeness matters. Most derivations read a handful
/// of fields, so entries live inline until the record grows past eight.
#[derive(Debug, Clone, Default)]
pub struct DependencyRecord {
    entries: SmallVec<[(FieldKey, Value); 8]>,
}

impl DependencyRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `(key, value)` entry.
    ///
    /// A key already present is skipped: within one snapshot every read of
    /// a key resolves to the same value, so the first observation stands.
    pub(crate) fn insert(&mut self, key: FieldKey, value: Value) {
        if self.contains(&key) {
            return;
        }
        self.entries.push((key, value));
    }

    /// Check whether `key` was recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == key)
    }

    /// The recorded entries, in read order.
    pub fn entries(&self) -> &[(FieldKey, Value)] {
        &self.entries
    }

    /// The recorded keys, in read order.
    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
