//! Snapshots, Views, and the Store
//!
//! This module holds the state-record side of the engine:
//!
//! - `state`: the [`Snapshot`] record and the [`Field`] tagged union, plus
//!   the field-marking constructors [`computed`], [`watch`] and
//!   [`watch_with`].
//! - `view`: the [`StateView`] interceptor that resolves derivation nodes
//!   transparently and reports reads to the tracking context.
//! - `cache`: the [`ViewCache`] guaranteeing one view identity per live
//!   snapshot.
//! - `store`: a minimal host [`Store`] with shallow-merge updates and
//!   change listeners whose delivered snapshots go through the cache.

mod cache;
mod state;
mod store;
pub(crate) mod view;

pub use cache::ViewCache;
pub use state::{computed, watch, watch_with, Field, Snapshot};
pub use store::{Listener, Store, SubscriptionId};
pub use view::StateView;
