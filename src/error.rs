//! CLI Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Fix the configuration file or environment.
    #[display("invalid configuration")]
    Config,
    /// Install Chrome or Chromium, or configure its location.
    #[display("no usable browser")]
    Browser,
    /// The presentation could not be reached or loaded.
    #[display("could not traverse presentation")]
    Traversal,
    /// The background job failed.
    #[display("capture job failed: {_0}")]
    Job(#[error(not(source))] String),
    #[display("could not assemble document")]
    Assembly,
    #[display("could not write {_0}")]
    Write(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Traversal | Self::Job(_))
    }
}
