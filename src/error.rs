//! Error kinds for the solver, per spec.md §7.

use thiserror::Error;

/// Failure modes of [`crate::solve`].
///
/// Every variant here is fatal: the solve either completes or aborts. There
/// is no partial-failure/partial-result semantics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FmmError {
    /// `accuracy` was not one of the two supported digit counts.
    #[error("unsupported accuracy: {0} (expected 3 or 6)")]
    UnsupportedAccuracy(u32),

    /// Tree refinement reached the hard level cap (`MAX_LEVEL`). Indicates
    /// duplicate or pathologically coincident points beyond leaf capacity.
    #[error("tree refinement exceeded the maximum depth; check for duplicate points")]
    TooDeep,

    /// A boundary precondition on the inputs was violated.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A caller-visible allocation failure (scratch buffers requested via a
    /// fallible reservation). Ordinary allocator aborts are not represented
    /// here; see spec.md §7.
    #[error("allocation failure")]
    Allocation,
}

pub type FmmResult<T> = Result<T, FmmError>;
