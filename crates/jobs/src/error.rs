//! Job Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A job error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for job operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No job with this identifier exists (or it was evicted).
    #[display("job not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A traversal batch failed fatally.
    #[display("traversal failed")]
    Traversal,
    /// The captured artifacts could not be assembled into a document.
    #[display("document assembly failed")]
    Assembly,
    /// The job finished without capturing anything.
    #[display("nothing was captured")]
    NothingCaptured,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Traversal)
    }
}
