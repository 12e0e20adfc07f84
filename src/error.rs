//! Lifecycle errors raised by [`crate::Graph`].
//!
//! Contract violations that Rust's type system can reject at compile time
//! (e.g. joining streams whose records aren't `(K, V)` shaped) are not
//! represented here — there is no runtime check to report.

use thiserror::Error;

/// Errors raised by [`crate::Graph`] lifecycle operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// An operator or input was registered after the graph was finalized.
    #[error("cannot modify a finalized graph")]
    AlreadyFinalized,

    /// `finalize` was called on an already-finalized graph.
    #[error("graph is already finalized")]
    FinalizeCalledTwice,

    /// `step` or `run` was called before `finalize`.
    #[error("graph must be finalized before it can be stepped")]
    NotFinalized,
}
