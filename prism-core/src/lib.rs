//! Prism Core
//!
//! This crate implements a reactive memoization engine for snapshot-based
//! state stores. A state record's fields may be plain values or *derived*:
//! a derived field is recomputed only when the specific fields it actually
//! read during its last evaluation have changed, and otherwise returns its
//! cached result.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `track`: the thread-local tracking context and dependency records
//! - `node`: derivation nodes (auto-tracked and explicitly selected)
//! - `store`: snapshots, the read-intercepting view, the view cache, and a
//!   minimal host store
//! - `value`: the dynamically-typed field value
//! - `error`: the error surface
//!
//! # How Invalidation Works
//!
//! Reading a derived field through a [`StateView`] resolves its node. If
//! the view is the one the node last evaluated against, the cached output
//! comes back untouched. On a new snapshot the node replays its last
//! dependency record (the `(field, value)` pairs its computation read)
//! and recomputes only if one of them changed. While the computation runs,
//! every field it reads is recorded into a fresh record via the
//! thread-local tracking stack, so the dependency set always mirrors the
//! last execution, conditional branches included.
//!
//! # Example
//!
//! ```rust,ignore
//! use prism_core::{computed, Field, Store, Value};
//!
//! let store = Store::new([
//!     ("a", Field::from(1)),
//!     ("squared", computed(|s| {
//!         let a = s.get("a")?.as_int().unwrap_or(0);
//!         Ok(Value::from(a * a))
//!     })),
//! ]);
//!
//! assert_eq!(store.state().get("squared")?, Value::from(1));
//!
//! store.set_state([("a", 3)]);
//! assert_eq!(store.state().get("squared")?, Value::from(9));
//! ```

pub mod error;
pub mod node;
pub mod store;
pub mod track;
pub mod value;

pub use error::{BoxError, StoreError};
pub use store::{computed, watch, watch_with, Field, Snapshot, StateView, Store, ViewCache};
pub use track::{untrack, DependencyRecord};
pub use value::{FieldKey, Value};
