//! Explicit-selection Derivation Nodes
//!
//! A `WatchNode` decouples "what counts as a dependency" from "what fields
//! are mechanically read". A selector extracts a selection from the state;
//! the node recomputes only when the selection changes according to an
//! equality function. The computation itself may read whatever it likes
//! without widening the node's own invalidation trigger.
//!
//! The default equality is [`Value`] equality, i.e. same-value for scalars
//! and identity for lists/maps. A selector that builds a fresh tuple on
//! every evaluation should pair it with a structural equality such as
//! [`Value::deep_eq`].

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

use crate::error::BoxError;
use crate::store::view::{StateView, ViewInner};
use crate::value::Value;

/// Selector signature: extract the watched selection from the state.
pub type SelectorFn = dyn Fn(&StateView) -> Result<Value, BoxError> + Send + Sync;

/// Computation signature: produce the field value from a selection.
pub type SelectionComputeFn = dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync;

/// Equality signature: decide whether two selections are the same.
pub type SelectionEqFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// A memoized derived field with an explicit selection.
///
/// Same lifecycle as [`ComputedNode`](crate::node::ComputedNode): one node
/// per field, shared by every snapshot of the store.
pub struct WatchNode {
    selector: Box<SelectorFn>,
    compute: Box<SelectionComputeFn>,
    eq: Box<SelectionEqFn>,
    state: RwLock<WatchState>,
}

#[derive(Default)]
struct WatchState {
    input: Weak<ViewInner>,
    cached: Option<WatchCached>,
}

struct WatchCached {
    selection: Value,
    output: Value,
}

impl WatchNode {
    /// Create a node with the default selection equality (`Value` equality).
    pub fn new<S, C>(selector: S, compute: C) -> Self
    where
        S: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
        C: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::with_eq(selector, compute, |prev, next| prev == next)
    }

    /// Create a node with a custom selection equality.
    pub fn with_eq<S, C, E>(selector: S, compute: C, eq: E) -> Self
    where
        S: Fn(&StateView) -> Result<Value, BoxError> + Send + Sync + 'static,
        C: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
        E: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            selector: Box::new(selector),
            compute: Box::new(compute),
            eq: Box::new(eq),
            state: RwLock::new(WatchState::default()),
        }
    }

    /// Resolve the node against `view`.
    ///
    /// The selector runs on every new snapshot; its reads are tracked
    /// normally if an enclosing derivation is being recorded. The
    /// computation runs only when the selection changed per the equality
    /// function. Errors from either function propagate with no node state
    /// mutated.
    pub fn resolve(&self, view: &StateView) -> Result<Value, BoxError> {
        // Fast path: same snapshot view as the previous evaluation.
        {
            let state = self.state.read().expect("watch state lock poisoned");
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

        let selection = (self.selector)(view)?;

        let prior_output = {
            let state = self.state.read().expect("watch state lock poisoned");
            state.cached.as_ref().and_then(|cached| {
                if (self.eq)(&cached.selection, &selection) {
                    Some(cached.output.clone())
                } else {
                    None
                }
            })
        };

        let output = match prior_output {
            Some(output) => output,
            None => {
                trace!("selection changed, recomputing watch field");
                (self.compute)(&selection)?
            }
        };

        let mut state = self.state.write().expect("watch state lock poisoned");
        state.cached = Some(WatchCached {
            selection,
            output: output.clone(),
        });
        state.input = view.downgrade();
        Ok(output)
    }

    /// Check whether the node holds a cached output.
    pub fn has_cached(&self) -> bool {
        self.state
            .read()
            .expect("watch state lock poisoned")
            .cached
            .is_some()
    }
}

impl fmt::Debug for WatchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().expect("watch state lock poisoned");
        f.debug_struct("WatchNode")
            .field("cached", &state.cached.is_some())
            .finish()
    }
}
