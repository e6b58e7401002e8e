//! Auto-tracked Derivation Nodes
//!
//! A `ComputedNode` is a memoized wrapper around a pure function from state
//! to a value. The node discovers its own dependencies: while the function
//! runs, every field it reads through the state view is recorded, and on
//! later snapshots the node recomputes only if one of those recorded fields
//! actually changed.
//!
//! # How Resolution Works
//!
//! 1. Same view as last time? Return the cached output. No dependency
//!    check, no recomputation; repeated reads against one snapshot are O(1)
//!    regardless of how many fields the computation touches.
//!
//! 2. New view, but a previous dependency record exists? Replay the record
//!    against the new view, short-circuiting on the first mismatch. If
//!    every recorded value still matches, keep the cached output and just
//!    remember the new view so step 1 applies next time.
//!
//! 3. Otherwise recompute inside a fresh tracking frame, and store the
//!    frame's record, the output, and the view it came from.
//!
//! A failing computation caches nothing: the node keeps whatever state it
//! had, and the error propagates to whoever read the field.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

use crate::error::BoxError;
use crate::store::view::{StateView, ViewInner};
use crate::track::{self, DependencyRecord, TrackScope};
use crate::value::{FieldKey, Value};

/// Computation signature of an auto-tracked derived field.
pub type ComputeFn = dyn Fn(&StateView) -> Result<Value, BoxError> + Send + Sync;

/// A memoized, auto-tracked derived field.
///
/// One node exists per derived field for the life of the store; every
/// snapshot carries the same `Arc`, so the cache survives state updates.
pub struct ComputedNode {
    compute: Box<ComputeFn>,
    state: RwLock<NodeState>,
}

#[derive(Default)]
struct NodeState {
    /// Identity of the last view this node was evaluated against. Weak so
    /// the node never keeps a dead snapshot alive.
    input: Weak<ViewInner>,
    /// Previous evaluation, absent only before the first one.
    cached: Option<Cached>,
}

/// A completed evaluation. Holding record and output together encodes the
/// invariant that an output exists whenever a record does.
struct Cached {
    record: DependencyRecord,
    output: Value,
}

impl ComputedNode {
    /// Create a node from a computation function.
    ///
    /// The function is not run here; the first read of the field runs it.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            state: RwLock::new(NodeState::default()),
        }
    }

    /// Resolve the node against `view`, recomputing only if needed.
    ///
    /// Called by the view when a field holding this node is read. The node
    /// is handed the *view*, not the raw snapshot, so any reads the
    /// computation performs are themselves intercepted and tracked.
    pub fn resolve(&self, view: &StateView) -> Result<Value, BoxError> {
        // Fast path: same snapshot view as the previous evaluation.
        {
            let state = self.state.read().expect("node state lock poisoned");
            if let Some(cached) = &state.cached {
                let same_view = state
                    .input
                    .upgrade()
                    .map(|prev| Arc::ptr_eq(&prev, view.inner()))
                    .unwrap_or(false);
                if same_view {
                    return Ok(cached.output.clone());
                }
            }
        }

        // New snapshot: replay the previous record against it. The reads
        // run untracked so they do not leak into an enclosing derivation's
        // record; the enclosing record gets this node's resolved output
        // from the view, nothing more.
        let prior = {
            let state = self.state.read().expect("node state lock poisoned");
            state
                .cached
                .as_ref()
                .map(|cached| (cached.record.clone(), cached.output.clone()))
        };
        if let Some((record, output)) = prior {
            if record_still_valid(&record, view) {
                let mut state = self.state.write().expect("node state lock poisoned");
                state.input = view.downgrade();
                trace!(deps = record.len(), "dependencies unchanged, reusing output");
                return Ok(output);
            }
        }

        // Recompute inside a fresh tracking frame. The lock is not held
        // while the user function runs, so the function may read other
        // derived fields (or, pathologically, recurse) without deadlocking.
        let scope = TrackScope::enter();
        let result = (self.compute)(view);
        let record = scope.collected();
        drop(scope);

        let output = result?;
        trace!(deps = record.len(), "recomputed derived field");

        let mut state = self.state.write().expect("node state lock poisoned");
        state.cached = Some(Cached {
            record,
            output: output.clone(),
        });
        state.input = view.downgrade();
        Ok(output)
    }

    /// Keys recorded by the last completed evaluation, in read order.
    ///
    /// `None` before the first evaluation.
    pub fn last_dependencies(&self) -> Option<Vec<FieldKey>> {
        let state = self.state.read().expect("node state lock poisoned");
        state
            .cached
            .as_ref()
            .map(|cached| cached.record.keys().cloned().collect())
    }

    /// Check whether the node holds a cached output.
    pub fn has_cached(&self) -> bool {
        self.state
            .read()
            .expect("node state lock poisoned")
            .cached
            .is_some()
    }
}

/// Replay `record` against `view`: true if every recorded value still
/// matches. A read that fails counts as a mismatch; the recompute path
/// surfaces the underlying error.
fn record_still_valid(record: &DependencyRecord, view: &StateView) -> bool {
    track::untrack(|| {
        record.entries().iter().all(|(key, seen)| {
            view.get(key)
                .map(|current| current == *seen)
                .unwrap_or(false)
        })
    })
}

impl fmt::Debug for ComputedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().expect("node state lock poisoned");
        f.debug_struct("ComputedNode")
            .field("cached", &state.cached.is_some())
            .field(
                "deps",
                &state
                    .cached
                    .as_ref()
                    .map(|cached| cached.record.len())
                    .unwrap_or(0),
            )
            .finish()
    }
}
