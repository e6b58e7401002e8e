//! The Store
//!
//! A minimal host store over the memoization core. It owns the current
//! snapshot, produces successors by shallow merge, and notifies change
//! listeners, with both the previous and next snapshot routed through the
//! view cache first, so every consumer (direct reads and listeners alike)
//! sees the same intercepted views and derivation fast paths keep firing.
//!
//! The store keeps a strong handle on the current snapshot's view; old
//! views survive only as long as somebody (a listener, a caller) holds
//! them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::store::cache::ViewCache;
use crate::store::state::{Field, Snapshot};
use crate::store::view::StateView;
use crate::value::FieldKey;

/// Unique identifier for a change listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A change listener. Receives `(next, previous)` views after an update.
pub type Listener = Box<dyn Fn(&StateView, &StateView) + Send + Sync>;

/// A state store with derived fields.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: RwLock<Current>,
    cache: ViewCache,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

struct Current {
    snapshot: Arc<Snapshot>,
    /// Strong handle on the current view so its identity is stable across
    /// repeated `state()` calls.
    view: StateView,
}

impl Store {
    /// Create a store from `(key, field)` pairs.
    ///
    /// Derived fields are inserted with [`computed`](crate::store::computed)
    /// / [`watch`](crate::store::watch); their nodes are created here, once,
    /// and live for the life of the store.
    pub fn new<I, K, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<FieldKey>,
        F: Into<Field>,
    {
        let snapshot = Arc::new(Snapshot::from_fields(fields));
        let cache = ViewCache::new();
        let view = cache.view_of(&snapshot);
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(Current { snapshot, view }),
                cache,
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The current snapshot, as an intercepting view.
    ///
    /// Repeated calls between updates return the same view identity.
    pub fn state(&self) -> StateView {
        self.inner
            .current
            .read()
            .expect("store state lock poisoned")
            .view
            .clone()
    }

    /// Shallow-merge `updates` into the state, producing a new snapshot.
    ///
    /// Updated keys overwrite existing fields; assigning a plain value
    /// over a derived key replaces the derivation. Fields that are carried
    /// over share their derivation nodes with the previous snapshot, so
    /// caches survive the update.
    ///
    /// Listeners run after the swap, outside the store's state lock, and
    /// receive `(next, previous)` views built by the cache.
    pub fn set_state<I, K, F>(&self, updates: I)
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<FieldKey>,
        F: Into<Field>,
    {
        let (next_view, prev_view) = {
            let mut current = self
                .inner
                .current
                .write()
                .expect("store state lock poisoned");

            let next = Arc::new(
                current
                    .snapshot
                    .merged(updates.into_iter().map(|(k, f)| (k.into(), f.into()))),
            );
            let next_view = self.inner.cache.view_of(&next);
            let prev_view = std::mem::replace(&mut current.view, next_view.clone());
            current.snapshot = next;
            (next_view, prev_view)
        };

        trace!(fields = next_view.len(), "state updated");

        let listeners = self
            .inner
            .listeners
            .read()
            .expect("store listeners lock poisoned");
        for (_, listener) in listeners.iter() {
            listener(&next_view, &prev_view);
        }
    }

    /// Register a change listener.
    ///
    /// The listener is invoked on every update with the next and previous
    /// views; reading either view resolves derived fields as usual.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StateView, &StateView) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.inner
            .listeners
            .write()
            .expect("store listeners lock poisoned")
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .listeners
            .write()
            .expect("store listeners lock poisoned")
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .expect("store listeners lock poisoned")
            .len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("fields", &self.state().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
