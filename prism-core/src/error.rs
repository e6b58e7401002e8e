//! Error types for the store surface.
//!
//! The engine itself never retries or swallows anything: a failing user
//! computation propagates synchronously to whoever read the field that
//! triggered it, and no node state is mutated on the way out.

use thiserror::Error;

use crate::value::FieldKey;

/// Error type user derivations fail with.
///
/// Nested derivation failures chain naturally: a [`StoreError`] coming out
/// of an inner field read coerces into this type via `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by reading a field through a state view.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist on the snapshot.
    #[error("unknown field `{0}`")]
    UnknownField(FieldKey),

    /// A derived field's user computation failed.
    ///
    /// The node caches nothing on failure; the next read of the field
    /// re-attempts from scratch.
    #[error("derived field `{field}` failed")]
    Derivation {
        /// Key of the field whose computation failed.
        field: FieldKey,
        /// The underlying failure raised by the user function.
        #[source]
        source: BoxError,
    },
}
