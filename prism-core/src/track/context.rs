//! Tracking Context Stack
//!
//! The tracking context records which fields a derivation reads while it is
//! being evaluated. This enables automatic dependency tracking: when a view
//! resolves a field, it reports the read here, and the innermost in-flight
//! evaluation picks it up.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames, one frame per in-flight
//! evaluation. Evaluating a derivation pushes a frame; when the evaluation
//! completes the frame is popped. This design supports nested evaluations
//! (a derivation that reads another derivation) without the frames mixing,
//! and gives each thread its own stack so independent stores never share
//! tracking state.
//!
//! Frames are popped by guard types in `Drop`, so the stack stays balanced
//! on every exit path, including panics and early returns.

use std::cell::RefCell;

use super::DependencyRecord;
use crate::value::{FieldKey, Value};

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// One open dependency-record scope.
struct Frame {
    /// Entries recorded so far for the evaluation that opened this frame.
    record: DependencyRecord,
    /// An isolation frame swallows reads instead of recording them.
    /// Pushed by [`untrack`]; its record is discarded on pop.
    isolated: bool,
}

/// Guard that pops the frame it pushed when dropped.
pub(crate) struct TrackScope {
    _no_send: std::marker::PhantomData<*const ()>,
}

impl TrackScope {
    /// Open a recording frame for one derivation evaluation.
    ///
    /// Field reads performed until the guard drops are recorded into this
    /// frame (unless a nested scope is opened on top of it).
    pub(crate) fn enter() -> Self {
        Self::push(false)
    }

    /// Open an isolation frame.
    ///
    /// Reads land here instead of in the enclosing frame, and the frame is
    /// discarded when the guard drops. This shields the enclosing
    /// derivation's record; a derivation evaluated *inside* the scope still
    /// pushes its own recording frame on top and tracks correctly for
    /// itself.
    pub(crate) fn isolated() -> Self {
        Self::push(true)
    }

    fn push(isolated: bool) -> Self {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                record: DependencyRecord::new(),
                isolated,
            });
        });
        TrackScope {
            _no_send: std::marker::PhantomData,
        }
    }

    /// The entries recorded into this scope's frame so far.
    ///
    /// Called by a derivation node right after its computation returns,
    /// while the frame is still the top of the stack.
    pub(crate) fn collected(&self) -> DependencyRecord {
        FRAME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.record.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackScope {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "tracking frame stack underflow");
        });
    }
}

/// Report a resolved field read to the innermost open frame.
///
/// No-op when no evaluation is in flight (reads outside any derivation are
/// not tracked) or when the innermost frame is an isolation frame.
pub(crate) fn record(key: &FieldKey, value: &Value) {
    FRAME_STACK.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            if !frame.isolated {
                frame.record.insert(key.clone(), value.clone());
            }
        }
    });
}

/// Check whether a derivation evaluation is currently being tracked on this
/// thread.
pub fn is_tracking() -> bool {
    FRAME_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|frame| !frame.isolated)
            .unwrap_or(false)
    })
}

/// Run `body` with dependency tracking suppressed.
///
/// Fields read inside `body` are not recorded as dependencies of the
/// enclosing derivation, so the derivation will not recompute when those
/// fields change. A derivation *resolved* inside `body` still computes its
/// own value and tracks its own dependencies correctly; only its
/// contribution to the enclosing record is suppressed.
///
/// The suppression covers the dynamic extent of `body` and is restored on
/// every exit path.
pub fn untrack<R>(body: impl FnOnce() -> R) -> R {
    let _scope = TrackScope::isolated();
    body()
}

#[cfg(test)]
fn stack_depth() -> usize {
    FRAME_STACK.with(|stack| stack.borrow().len())
}
