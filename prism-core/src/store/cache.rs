//! Snapshot Cache
//!
//! Maps a raw snapshot (by identity) to its previously built view, so
//! repeated access to the same snapshot never mints a second view.
//!
//! This is not an optimization nicety: derivation nodes skip all work when
//! they are resolved against the *same view allocation* as last time. If a
//! fresh view were built per `state()` call or per listener delivery, that
//! identity would never repeat and every read would fall through to the
//! dependency-comparison path.
//!
//! Entries hold the view weakly; the snapshot's consumers, not the cache,
//! decide how long a view stays alive. The cache never evicts a live
//! entry; it only drops bookkeeping for views that are already gone.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

use crate::store::state::Snapshot;
use crate::store::view::{StateView, ViewInner};

/// Cache of one view per live snapshot.
#[derive(Default)]
pub struct ViewCache {
    /// Keyed by snapshot address. A dead weak entry may linger at a reused
    /// address, so hits re-validate by upgrading before use.
    entries: RwLock<HashMap<usize, Weak<ViewInner>>>,
}

impl ViewCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing view for `snapshot`, or build and remember one.
    pub fn view_of(&self, snapshot: &Arc<Snapshot>) -> StateView {
        let address = Arc::as_ptr(snapshot) as usize;

        {
            let entries = self.entries.read().expect("view cache lock poisoned");
            if let Some(inner) = entries.get(&address).and_then(Weak::upgrade) {
                return StateView::from_inner(inner);
            }
        }

        let mut entries = self.entries.write().expect("view cache lock poisoned");
        // Re-check under the write lock; another thread may have built the
        // view between the two lock acquisitions.
        if let Some(inner) = entries.get(&address).and_then(Weak::upgrade) {
            return StateView::from_inner(inner);
        }

        // Dead weak entries accumulate as snapshots die; sweep them while
        // we hold the write lock anyway.
        entries.retain(|_, weak| weak.strong_count() > 0);

        let view = StateView::over(Arc::clone(snapshot));
        entries.insert(address, view.downgrade());
        trace!(snapshot = address, "built view for snapshot");
        view
    }

    /// Number of live entries, counting only views that are still
    /// reachable.
    pub fn live_views(&self) -> usize {
        self.entries
            .read()
            .expect("view cache lock poisoned")
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("live_views", &self.live_views())
            .finish()
    }
}
