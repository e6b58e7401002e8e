//! Dependency Tracking
//!
//! This module implements the tracking side of the engine: the thread-local
//! stack of in-flight evaluations and the dependency records they collect.
//!
//! # Concepts
//!
//! ## Dependency Records
//!
//! While a derivation's computation runs, every field it reads through a
//! state view is recorded as a `(key, observed value)` pair. The finished
//! record is what the derivation later replays against a new snapshot to
//! decide whether it is stale.
//!
//! ## The Frame Stack
//!
//! Evaluations nest: a derivation may read another derivation, which opens
//! its own record on top of the caller's. The stack keeps the two apart and
//! attributes every read to the innermost evaluation.
//!
//! ## Untracked Reads
//!
//! [`untrack`] runs a closure with recording suppressed, so a derivation
//! can peek at a field without depending on it. Suppression is implemented
//! as an isolated frame that is discarded after the closure returns, which
//! keeps nested derivations tracking correctly for themselves.

mod context;
mod record;

pub use context::{is_tracking, untrack};
pub use record::DependencyRecord;

pub(crate) use context::{record, TrackScope};
