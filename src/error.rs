//! Analysis error types.

use thiserror::Error;

/// Errors surfaced by the analysis components.
///
/// The trace is static: none of these are transient, and no component
/// retries or degrades silently. A query either returns a fully valid
/// result or fails with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required event kind, or a marker within one, never occurs in the
    /// trace. The analysis that needs it is unavailable.
    #[error("trace is missing {0}")]
    MissingRequirement(String),

    /// A task designator does not resolve to exactly one workload task.
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// More than one clock reference marker in a single trace. The
    /// producer emits exactly one; duplicates mean the trace is malformed.
    #[error("found {0} clock_ref markers, expected exactly one")]
    AmbiguousReference(usize),

    /// A phase index or lookup timestamp falls outside the data the trace
    /// actually contains.
    #[error("out of range: {0}")]
    OutOfRange(String),
}

pub type Result<T> = std::result::Result<T, Error>;
