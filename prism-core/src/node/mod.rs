//! Derivation Nodes
//!
//! A derivation node is the stateful, memoized wrapper around one derived
//! field's computation. Two variants exist:
//!
//! - [`ComputedNode`]: auto-tracked. The node records which fields the
//!   computation reads and recomputes only when one of them changed.
//! - [`WatchNode`]: explicitly selected. A selector plus an equality
//!   function decide staleness; the computation's own reads are irrelevant
//!   to the node's invalidation.
//!
//! Nodes live inside [`Field`](crate::store::Field) entries of a snapshot
//! and are resolved transparently by the state view; consumers only ever
//! see the resolved values.

mod computed;
mod watch;

pub use computed::{ComputedNode, ComputeFn};
pub use watch::{SelectionComputeFn, SelectionEqFn, SelectorFn, WatchNode};
